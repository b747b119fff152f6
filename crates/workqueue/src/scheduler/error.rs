use uuid::Uuid;

/// Errors reported by the work queue.
#[derive(Debug, thiserror::Error)]
pub enum WorkQueueError {
    #[error("Work item {0} is already live in the queue")]
    DuplicateSubmission(Uuid),
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
