//! Completion notification seam.

use super::types::WorkItemCompleted;

/// Receives completion announcements for items submitted with `send_event`.
///
/// Called from whichever thread runs the purge (`complete` or
/// `begin_frame`), never while the queue lock is held, so a listener may
/// submit follow-up work.
pub trait CompletionListener: Send + Sync {
    fn on_completed(&self, event: &WorkItemCompleted);
}

impl<F> CompletionListener for F
where
    F: Fn(&WorkItemCompleted) + Send + Sync,
{
    fn on_completed(&self, event: &WorkItemCompleted) {
        self(event)
    }
}
