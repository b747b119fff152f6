use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::item::WorkItem;
use super::queue::PriorityQueue;
use super::types::{PauseState, Priority};

/// Everything guarded by the queue lock.
#[derive(Debug)]
pub struct QueueState {
    /// Items awaiting execution.
    pub queue: PriorityQueue,
    /// Submitted and not yet purged, in submission order. Keeps items alive
    /// while they execute.
    pub live: Vec<Arc<WorkItem>>,
    /// Dequeue gate. Only changed while the lock is held.
    pub pause: PauseState,
}

impl QueueState {
    pub fn is_live(&self, item: &Arc<WorkItem>) -> bool {
        self.live.iter().any(|live| Arc::ptr_eq(live, item))
    }

    /// Remove a specific instance from the live list.
    pub fn remove_live(&mut self, item: &Arc<WorkItem>) -> Option<Arc<WorkItem>> {
        let index = self.live.iter().position(|live| Arc::ptr_eq(live, item))?;
        Some(self.live.remove(index))
    }

    /// Whether no live item at or above `threshold` is still pending.
    pub fn is_completed(&self, threshold: Priority) -> bool {
        !self
            .live
            .iter()
            .any(|item| item.priority() >= threshold && !item.is_completed())
    }

    /// Claim the next item for a worker, respecting the gate.
    pub fn claim(&mut self) -> Option<Arc<WorkItem>> {
        if self.pause.is_gated() {
            return None;
        }
        self.queue.pop_front()
    }
}

/// Monotonic counters, updated without the queue lock.
#[derive(Debug, Default)]
pub struct Counters {
    pub submitted: AtomicU64,
    pub executed: AtomicU64,
    pub removed: AtomicU64,
    pub purged: AtomicU64,
    pub events_sent: AtomicU64,
    pub pool_trimmed: AtomicU64,
    pub frames: AtomicU64,
    pub fallback_executed: AtomicU64,
}

impl Counters {
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// State shared between the [`WorkQueue`](crate::WorkQueue) and its workers.
#[derive(Debug)]
pub struct Shared {
    state: Mutex<QueueState>,
    /// Lock-free mirror of `QueueState::pause` so parked workers can skip
    /// the lock. Authoritative value is the one under the lock.
    gated: AtomicBool,
    shutdown: AtomicBool,
    pub counters: Counters,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: PriorityQueue::new(),
                live: Vec::new(),
                pause: PauseState::Running,
            }),
            gated: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    /// Take the queue lock. Entry points never run under this lock, so a
    /// poisoned lock still guards consistent state.
    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Change the gate. Must be called with the lock held via `state`.
    pub fn set_pause(&self, state: &mut QueueState, pause: PauseState) {
        state.pause = pause;
        self.gated.store(pause.is_gated(), Ordering::Release);
    }

    pub fn is_gated(&self) -> bool {
        self.gated.load(Ordering::Acquire)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the shared queue state.
pub type SharedQueue = Arc<Shared>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_blocks_claim() {
        let shared = Shared::new();
        let mut state = shared.lock();
        state.queue.insert(Arc::new(WorkItem::new()));

        shared.set_pause(&mut state, PauseState::Paused);
        assert!(shared.is_gated());
        assert!(state.claim().is_none());

        shared.set_pause(&mut state, PauseState::Running);
        assert!(!shared.is_gated());
        assert!(state.claim().is_some());
    }

    #[test]
    fn completion_ignores_lower_priorities() {
        let shared = Shared::new();
        let mut state = shared.lock();
        let low = Arc::new(WorkItem::new());
        let high = Arc::new(WorkItem::new());
        high.set_priority(5);
        state.live.push(Arc::clone(&low));
        state.live.push(Arc::clone(&high));

        assert!(!state.is_completed(5));
        high.execute(0);
        assert!(state.is_completed(5));
        assert!(!state.is_completed(0));
    }

    #[test]
    fn remove_live_by_identity() {
        let shared = Shared::new();
        let mut state = shared.lock();
        let item = Arc::new(WorkItem::new());
        state.live.push(Arc::clone(&item));

        assert!(state.is_live(&item));
        assert!(state.remove_live(&item).is_some());
        assert!(!state.is_live(&item));
        assert!(state.remove_live(&item).is_none());
    }
}
