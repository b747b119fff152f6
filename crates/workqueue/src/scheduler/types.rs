use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::item::WorkItem;

/// Work item priority. Higher value = served first.
pub type Priority = u32;

/// Default priority of a fresh or recycled item. Lowest possible.
pub const PRIORITY_LOWEST: Priority = 0;

/// Highest possible priority. `complete(PRIORITY_HIGHEST)` only waits for
/// items submitted at this exact level.
pub const PRIORITY_HIGHEST: Priority = Priority::MAX;

/// Gate state of the queue, checked by every dequeue under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseState {
    /// Workers dequeue freely.
    Running,
    /// Automatic pause applied when there is no work. The next submission lifts it.
    Parked,
    /// Explicit pause requested by a caller. Only `resume` or `complete` lift it.
    Paused,
}

impl PauseState {
    pub fn is_gated(self) -> bool {
        self != PauseState::Running
    }
}

/// Announcement sent to the [`CompletionListener`](super::listener::CompletionListener)
/// when an item with `send_event` set is purged.
#[derive(Debug, Clone)]
pub struct WorkItemCompleted {
    /// The completed item. Its payload is still intact at this point.
    pub item: Arc<WorkItem>,
    /// When the purge observed the completion.
    pub purged_at: DateTime<Utc>,
}
