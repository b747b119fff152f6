use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use framequeue_core::WorkQueueConfig;
use tracing::{error, info, warn};

use crate::scheduler::error::WorkQueueError;
use crate::scheduler::listener::CompletionListener;
use crate::scheduler::metrics::WorkQueueMetrics;
use crate::scheduler::pool::ItemPool;
use crate::scheduler::state::{Counters, Shared, SharedQueue};
use crate::scheduler::types::PauseState;
use crate::scheduler::worker::Worker;

/// Lock a mutex, ignoring poison. Nothing runs user code under these locks.
pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Frame-budgeted priority work queue.
///
/// Submitted [`WorkItem`](crate::WorkItem)s run on a fixed set of worker
/// threads, highest priority first. Without workers, items run on the
/// calling thread inside [`begin_frame`](Self::begin_frame) under a time
/// budget, or inside [`complete`](Self::complete).
pub struct WorkQueue {
    pub(super) shared: SharedQueue,
    pub(super) pool: Mutex<ItemPool>,
    pub(super) workers: Mutex<Vec<Worker>>,
    /// Mirrors `workers.len()` for lock-free reads.
    pub(super) num_workers: AtomicUsize,
    pub(super) listener: RwLock<Option<Arc<dyn CompletionListener>>>,
    pub(super) non_threaded_work_ms: AtomicU64,
    pub(super) last_frame_at: Mutex<Option<DateTime<Utc>>>,
}

impl WorkQueue {
    /// Create a work queue with default settings and no workers.
    pub fn new() -> Self {
        Self::with_config(&WorkQueueConfig::default())
    }

    /// Create a work queue with the given settings. No workers are spawned.
    pub fn with_config(config: &WorkQueueConfig) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            pool: Mutex::new(ItemPool::new(config.pool_tolerance)),
            workers: Mutex::new(Vec::new()),
            num_workers: AtomicUsize::new(0),
            listener: RwLock::new(None),
            non_threaded_work_ms: AtomicU64::new(config.non_threaded_work_ms),
            last_frame_at: Mutex::new(None),
        }
    }

    /// Create a work queue and spawn the configured number of workers.
    pub fn start(config: &WorkQueueConfig) -> Result<Self, WorkQueueError> {
        let queue = Self::with_config(config);
        queue.create_workers(config.resolved_worker_threads())?;
        Ok(queue)
    }

    /// Spawn `count` worker threads, numbered from 1.
    ///
    /// Only the first call has an effect: other subsystems may size
    /// themselves by the worker count, so it is fixed once set. Workers start
    /// parked until the first item arrives. Returns the number of workers.
    pub fn create_workers(&self, count: usize) -> Result<usize, WorkQueueError> {
        if cfg!(not(feature = "threading")) {
            error!("Can not create worker threads as threading is disabled");
            return Ok(0);
        }

        let mut workers = lock(&self.workers);
        if !workers.is_empty() {
            if count != workers.len() {
                warn!(
                    requested = count,
                    existing = workers.len(),
                    "Worker threads already created, ignoring new count"
                );
            }
            return Ok(workers.len());
        }
        if count == 0 {
            return Ok(0);
        }

        self.park();

        for index in 1..=count {
            let worker = Worker::spawn(index, Arc::clone(&self.shared))?;
            workers.push(worker);
            self.num_workers.store(workers.len(), Ordering::Release);
        }

        info!(workers = count, "Created worker threads");
        Ok(count)
    }

    /// Number of worker threads. 0 means single-threaded fallback mode.
    pub fn num_workers(&self) -> usize {
        self.num_workers.load(Ordering::Acquire)
    }

    /// Install the listener notified when items with `send_event` are purged.
    pub fn set_completion_listener(&self, listener: Arc<dyn CompletionListener>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    pub fn clear_completion_listener(&self) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Per-frame budget for the single-threaded fallback, in milliseconds.
    pub fn non_threaded_work_ms(&self) -> u64 {
        self.non_threaded_work_ms.load(Ordering::Relaxed)
    }

    pub fn set_non_threaded_work_ms(&self, ms: u64) {
        self.non_threaded_work_ms.store(ms.max(1), Ordering::Relaxed);
    }

    /// Pool shrink tolerance, see [`purge_pool`](Self::purge_pool).
    pub fn tolerance(&self) -> usize {
        lock(&self.pool).tolerance()
    }

    pub fn set_tolerance(&self, tolerance: usize) {
        lock(&self.pool).set_tolerance(tolerance);
    }

    /// Items waiting to be claimed.
    pub fn num_queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Items submitted and not yet purged.
    pub fn num_live(&self) -> usize {
        self.shared.lock().live.len()
    }

    pub fn pool_size(&self) -> usize {
        lock(&self.pool).len()
    }

    /// Whether dequeuing is currently gated, explicitly or by parking.
    pub fn is_paused(&self) -> bool {
        self.shared.lock().pause.is_gated()
    }

    /// Snapshot of the queue's counters and sizes.
    pub fn metrics(&self) -> WorkQueueMetrics {
        let c = &self.shared.counters;
        let (queued, live, paused) = {
            let state = self.shared.lock();
            (state.queue.len(), state.live.len(), state.pause.is_gated())
        };
        WorkQueueMetrics {
            items_submitted: Counters::get(&c.submitted),
            items_executed: Counters::get(&c.executed),
            items_removed: Counters::get(&c.removed),
            items_purged: Counters::get(&c.purged),
            events_sent: Counters::get(&c.events_sent),
            pool_trimmed: Counters::get(&c.pool_trimmed),
            frames: Counters::get(&c.frames),
            fallback_executed: Counters::get(&c.fallback_executed),
            queued,
            live,
            pool_size: self.pool_size(),
            workers: self.num_workers(),
            paused,
            last_frame_at: *lock(&self.last_frame_at),
        }
    }

    /// Gate workers because there is nothing to do. An explicit pause is kept.
    pub(super) fn park(&self) {
        let mut state = self.shared.lock();
        if state.pause == PauseState::Running {
            self.shared.set_pause(&mut state, PauseState::Parked);
        }
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shared.request_shutdown();
        self.resume();

        let mut workers = lock(&self.workers);
        for worker in workers.iter_mut() {
            worker.join();
        }
        if !workers.is_empty() {
            info!(workers = workers.len(), "Stopped worker threads");
        }
        workers.clear();
    }
}
