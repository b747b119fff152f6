//! Frame-budgeted priority work queue.
//!
//! A [`WorkQueue`] runs [`WorkItem`]s on a fixed pool of worker threads,
//! highest priority first, with FIFO order among equal priorities. Callers
//! can block on a priority threshold with [`WorkQueue::complete`], which also
//! puts the calling thread to work. Without workers, items run inside the
//! per-frame hook under a time budget.

pub mod error;
pub mod item;
pub mod listener;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod runner;
pub mod state;
pub mod types;
pub mod worker;

pub use error::WorkQueueError;
pub use item::{ContextSlot, EntryPoint, WorkContext, WorkItem};
pub use listener::CompletionListener;
pub use metrics::WorkQueueMetrics;
pub use runner::WorkQueue;
pub use types::{PauseState, Priority, WorkItemCompleted, PRIORITY_HIGHEST, PRIORITY_LOWEST};
