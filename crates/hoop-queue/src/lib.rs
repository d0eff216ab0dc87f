//! Redis Streams job queue: Publisher/Subscriber adapter over [`job::JobEnvelope`].

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{FinalClipRange, JobEnvelope};
pub use queue::{JobQueue, QueueConfig};
