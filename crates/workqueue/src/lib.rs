pub mod scheduler;

pub use framequeue_core::WorkQueueConfig;
pub use scheduler::{
    CompletionListener, WorkContext, WorkItem, WorkItemCompleted, WorkQueue, WorkQueueError,
    WorkQueueMetrics, Priority, PRIORITY_HIGHEST, PRIORITY_LOWEST,
};
