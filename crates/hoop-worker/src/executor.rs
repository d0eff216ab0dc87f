//! Job executor: the Subscriber side of the Publisher/Subscriber pair.
//! Pulls envelopes from the queue and runs each through the pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hoop_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::context::WorkerContext;
use crate::error::WorkerResult;
use crate::pipeline;

/// Job executor that processes envelopes from the queue.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
    ctx: Arc<WorkerContext>,
}

impl JobExecutor {
    pub async fn new(config: WorkerConfig, queue: JobQueue) -> WorkerResult<Self> {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());
        let ctx = Arc::new(WorkerContext::new(config.clone()).await?);

        Ok(Self {
            config,
            queue: Arc::new(queue),
            job_semaphore,
            shutdown,
            consumer_name,
            ctx,
        })
    }

    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        let claim_task = {
            let queue = Arc::clone(&self.queue);
            let ctx = Arc::clone(&self.ctx);
            let semaphore = Arc::clone(&self.job_semaphore);
            let consumer_name = self.consumer_name.clone();
            let claim_interval = self.config.claim_interval;
            let claim_min_idle_ms = self.config.claim_min_idle.as_millis() as u64;
            let mut shutdown_rx = self.shutdown.subscribe();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(claim_interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            match queue.claim_pending(&consumer_name, claim_min_idle_ms, 5).await {
                                Ok(envelopes) if !envelopes.is_empty() => {
                                    info!("Claimed {} pending envelopes", envelopes.len());
                                    for (message_id, envelope) in envelopes {
                                        let ctx = Arc::clone(&ctx);
                                        let queue = Arc::clone(&queue);
                                        let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                            break;
                                        };
                                        tokio::spawn(async move {
                                            let _permit = permit;
                                            Self::execute_envelope(ctx, queue, message_id, envelope).await;
                                        });
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => warn!("Failed to claim pending envelopes: {}", e),
                            }
                        }
                    }
                }
            })
        };

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_envelopes() => {
                    if let Err(e) = result {
                        error!("Error consuming envelopes: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Job executor stopped");
        Ok(())
    }

    async fn consume_envelopes(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let envelopes = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if envelopes.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} envelopes from queue", envelopes.len());

        for (message_id, envelope) in envelopes {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| crate::error::WorkerError::job_failed("semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_envelope(ctx, queue, message_id, envelope).await;
            });
        }

        Ok(())
    }

    /// Run one envelope through the pipeline and ack. Per the envelope
    /// contract, the system acks after any terminal write to the Job
    /// (including `error`) — `pipeline::process_envelope` never returns an
    /// `Err` for an ordinary processing failure, only for conditions that
    /// prevented even that terminal write, which are left unacked for
    /// redelivery.
    async fn execute_envelope(
        ctx: Arc<WorkerContext>,
        queue: Arc<JobQueue>,
        message_id: String,
        envelope: hoop_queue::JobEnvelope,
    ) {
        let job_id = envelope.job_id.to_string();
        info!(job_id = %job_id, mode = ?envelope.mode, "executing envelope");

        match pipeline::process_envelope(&ctx, &envelope).await {
            Ok(()) => {
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_id = %job_id, error = %e, "failed to ack envelope");
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "envelope left unacked for redelivery");
            }
        }
    }

    async fn wait_for_jobs(&self) {
        loop {
            let available = self.job_semaphore.available_permits();
            if available == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
