use std::sync::Arc;

use tracing::{debug, error};

use crate::scheduler::error::WorkQueueError;
use crate::scheduler::item::WorkItem;
use crate::scheduler::state::{Counters, QueueState};
use crate::scheduler::types::PauseState;

use super::core::lock;
use super::WorkQueue;

impl WorkQueue {
    /// Get a recyclable item from the pool, allocating one if the pool is empty.
    pub fn get_free_item(&self) -> Arc<WorkItem> {
        lock(&self.pool).acquire()
    }

    /// Submit an item for execution.
    ///
    /// The item is queued ahead of every entry with a strictly lower
    /// priority and behind entries of equal or higher priority. Submitting
    /// an item that is still live (queued, executing, or completed but not
    /// yet purged) is rejected.
    pub fn add_work_item(&self, item: &Arc<WorkItem>) -> Result<(), WorkQueueError> {
        let threaded = self.num_workers() > 0;
        let mut state = self.shared.lock();

        if state.is_live(item) {
            error!(item = %item.id(), "Duplicate work item submitted to the work queue");
            return Err(WorkQueueError::DuplicateSubmission(item.id()));
        }

        item.clear_completed();
        state.live.push(Arc::clone(item));
        state.queue.insert(Arc::clone(item));

        if threaded && state.pause == PauseState::Parked {
            self.shared.set_pause(&mut state, PauseState::Running);
        }
        drop(state);

        Counters::add(&self.shared.counters.submitted, 1);
        debug!(item = %item.id(), priority = item.priority(), "Work item queued");
        Ok(())
    }

    /// Cancel an item that no thread has claimed yet.
    ///
    /// Returns false if the item already started, finished, or was never
    /// submitted. That is a normal race, not an error.
    pub fn remove_work_item(&self, item: &Arc<WorkItem>) -> bool {
        let removed = {
            let mut state = self.shared.lock();
            Self::take_queued(&mut state, item)
        };

        match removed {
            Some(item) => {
                self.finish_removal(vec![item]);
                true
            }
            None => {
                debug!(item = %item.id(), "Work item already claimed, not removed");
                false
            }
        }
    }

    /// Cancel several items at once. Returns how many were removed.
    pub fn remove_work_items(&self, items: &[Arc<WorkItem>]) -> usize {
        let removed: Vec<Arc<WorkItem>> = {
            let mut state = self.shared.lock();
            items
                .iter()
                .filter_map(|item| Self::take_queued(&mut state, item))
                .collect()
        };

        let count = removed.len();
        if count > 0 {
            self.finish_removal(removed);
        }
        count
    }

    /// Stop workers from claiming items until [`resume`](Self::resume).
    ///
    /// New submissions stay queued while paused. [`complete`](Self::complete)
    /// lifts the pause, since it needs the workers.
    pub fn pause(&self) {
        let mut state = self.shared.lock();
        if state.pause != PauseState::Paused {
            self.shared.set_pause(&mut state, PauseState::Paused);
            debug!("Work queue paused");
        }
    }

    /// Let workers claim items again.
    pub fn resume(&self) {
        let mut state = self.shared.lock();
        if state.pause != PauseState::Running {
            self.shared.set_pause(&mut state, PauseState::Running);
            debug!("Work queue resumed");
        }
    }

    fn take_queued(state: &mut QueueState, item: &Arc<WorkItem>) -> Option<Arc<WorkItem>> {
        if !state.queue.contains(item) || !state.is_live(item) {
            return None;
        }
        state.queue.remove(item);
        state.remove_live(item)
    }

    fn finish_removal(&self, removed: Vec<Arc<WorkItem>>) {
        Counters::add(&self.shared.counters.removed, removed.len() as u64);
        let mut pool = lock(&self.pool);
        for item in removed {
            debug!(item = %item.id(), "Work item removed");
            pool.release(item);
        }
    }
}
