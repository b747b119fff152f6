use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, trace};

use crate::scheduler::item::WorkItem;
use crate::scheduler::state::Counters;
use crate::scheduler::types::{PauseState, Priority, WorkItemCompleted, PRIORITY_LOWEST};

use super::core::lock;
use super::WorkQueue;

/// Index passed to entry points run by the calling thread.
const CALLER_THREAD_INDEX: usize = 0;

impl WorkQueue {
    /// Block until every item at or above `priority` has finished.
    ///
    /// The calling thread claims and runs qualifying items itself while the
    /// front of the queue is at or above the threshold, then spins until the
    /// workers finish whatever they claimed. If the queue is empty afterwards
    /// the workers are parked. Completed items at or above the threshold are
    /// purged before returning. There is no timeout.
    pub fn complete(&self, priority: Priority) {
        let threaded = self.num_workers() > 0;
        if threaded {
            self.resume();
        }

        let mut drained = 0usize;
        loop {
            let next = self.shared.lock().queue.pop_at_least(priority);
            let Some(item) = next else { break };
            self.run_on_caller(&item);
            drained += 1;
        }

        if threaded {
            while !self.is_completed(priority) {
                thread::yield_now();
            }

            let mut state = self.shared.lock();
            if state.queue.is_empty() && state.pause == PauseState::Running {
                self.shared.set_pause(&mut state, PauseState::Parked);
            }
        }

        trace!(priority, drained, "Completion barrier passed");
        self.purge_completed(priority);
    }

    /// Whether no live item at or above `priority` is still pending.
    pub fn is_completed(&self, priority: Priority) -> bool {
        self.shared.lock().is_completed(priority)
    }

    /// Sweep completed items at or above `priority` out of the live list.
    ///
    /// Items with `send_event` set are announced to the listener first, then
    /// pooled items are reset and recycled. Items below the threshold are
    /// left alone so a low-priority sweep never releases work that someone
    /// else is still tracking. Returns the number of items purged.
    pub fn purge_completed(&self, priority: Priority) -> usize {
        let mut finished: Vec<Arc<WorkItem>> = Vec::new();
        {
            let mut state = self.shared.lock();
            state.live.retain(|item| {
                if item.is_completed() && item.priority() >= priority {
                    finished.push(Arc::clone(item));
                    false
                } else {
                    true
                }
            });
        }

        if finished.is_empty() {
            return 0;
        }

        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(listener) = listener {
            let purged_at = Utc::now();
            let mut sent = 0u64;
            for item in finished.iter().filter(|item| item.sends_event()) {
                listener.on_completed(&WorkItemCompleted {
                    item: Arc::clone(item),
                    purged_at,
                });
                sent += 1;
            }
            Counters::add(&self.shared.counters.events_sent, sent);
        }

        let count = finished.len();
        {
            let mut pool = lock(&self.pool);
            for item in finished {
                pool.release(item);
            }
        }
        Counters::add(&self.shared.counters.purged, count as u64);
        count
    }

    /// Trim the free list if demand dropped by more than the tolerance.
    /// Returns the number of pooled items dropped.
    pub fn purge_pool(&self) -> usize {
        let trimmed = lock(&self.pool).purge();
        Counters::add(&self.shared.counters.pool_trimmed, trimmed as u64);
        trimmed
    }

    /// Per-frame hook, called once per application frame by the frame driver.
    ///
    /// Without worker threads, runs queued items on the calling thread until
    /// the queue is empty or the non-threaded budget is spent. An item is
    /// never started after the budget ran out. Always ends by purging all
    /// completed items and trimming the pool.
    pub fn begin_frame(&self) {
        Counters::add(&self.shared.counters.frames, 1);
        *lock(&self.last_frame_at) = Some(Utc::now());

        if self.num_workers() == 0 {
            let budget = Duration::from_millis(self.non_threaded_work_ms());
            let started = Instant::now();
            let mut executed = 0u64;

            while started.elapsed() < budget {
                let next = self.shared.lock().queue.pop_front();
                let Some(item) = next else { break };
                self.run_on_caller(&item);
                executed += 1;
            }

            if executed > 0 {
                Counters::add(&self.shared.counters.fallback_executed, executed);
                debug!(
                    executed,
                    remaining = self.num_queued(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Completed work without worker threads"
                );
            }
        }

        self.purge_completed(PRIORITY_LOWEST);
        self.purge_pool();
    }

    fn run_on_caller(&self, item: &Arc<WorkItem>) {
        item.run(CALLER_THREAD_INDEX);
        Counters::add(&self.shared.counters.executed, 1);
        item.mark_completed();
    }
}
