//! Video processing worker binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hoop_queue::JobQueue;
use hoop_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive("hoop=info".parse().unwrap()))
        .init();

    info!("Starting hoop-worker");

    // Load configuration
    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    // Create queue client
    let queue = match JobQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("Failed to create job queue: {}", e);
            std::process::exit(1);
        }
    };

    // Create executor
    let executor = match JobExecutor::new(config, queue).await {
        Ok(e) => e,
        Err(e) => {
            error!("Failed to create job executor: {}", e);
            std::process::exit(1);
        }
    };

    let executor = std::sync::Arc::new(executor);
    let run_handle = {
        let executor = std::sync::Arc::clone(&executor);
        tokio::spawn(async move { executor.run().await })
    };

    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
    executor.shutdown();

    match run_handle.await {
        Ok(Err(e)) => {
            error!("Executor error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Executor task panicked: {}", e);
            std::process::exit(1);
        }
        Ok(Ok(())) => {}
    }

    info!("Worker shutdown complete");
}
