use std::io;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use super::state::{Counters, SharedQueue};

/// A worker thread owned by the work queue.
#[derive(Debug)]
pub struct Worker {
    index: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a named worker thread. Index 0 is reserved for the calling thread.
    pub fn spawn(index: usize, shared: SharedQueue) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("framequeue-worker-{index}"))
            .spawn(move || process_items(&shared, index))?;
        Ok(Self {
            index,
            handle: Some(handle),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Wait for the thread to exit. Shutdown must already be requested.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = self.index, "Worker thread panicked");
            }
        }
    }
}

/// Worker loop: claim the front item, run it outside the lock, repeat.
fn process_items(shared: &SharedQueue, index: usize) {
    info!(worker = index, "Worker started");
    let mut was_active = false;

    loop {
        if shared.is_shutting_down() {
            break;
        }

        // Parked and idle: stay off the lock entirely.
        if shared.is_gated() && !was_active {
            thread::yield_now();
            continue;
        }

        let claimed = shared.lock().claim();
        match claimed {
            Some(item) => {
                was_active = true;
                debug!(worker = index, item = %item.id(), priority = item.priority(), "Executing work item");
                item.run(index);
                // Counted before completion is published.
                Counters::add(&shared.counters.executed, 1);
                item.mark_completed();
            }
            None => {
                was_active = false;
                thread::yield_now();
            }
        }
    }

    info!(
        worker = index,
        executed_total = Counters::get(&shared.counters.executed),
        "Worker stopped"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::scheduler::item::WorkItem;
    use crate::scheduler::state::Shared;
    use crate::scheduler::types::PauseState;

    #[test]
    fn worker_runs_queued_item_and_stops() {
        let shared: SharedQueue = Arc::new(Shared::new());
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in = Arc::clone(&ran);
        let item = WorkItem::with_entry_point(1, move |_, index| {
            ran_in.store(index, Ordering::SeqCst);
        });
        shared.lock().queue.insert(Arc::clone(&item));

        let mut worker = Worker::spawn(2, Arc::clone(&shared)).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !item.is_completed() && Instant::now() < deadline {
            thread::yield_now();
        }

        shared.request_shutdown();
        worker.join();

        assert!(item.is_completed());
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert_eq!(worker.index(), 2);
    }

    #[test]
    fn gated_worker_does_not_dequeue() {
        let shared: SharedQueue = Arc::new(Shared::new());
        {
            let mut state = shared.lock();
            shared.set_pause(&mut state, PauseState::Paused);
            state.queue.insert(Arc::new(WorkItem::new()));
        }

        let mut worker = Worker::spawn(1, Arc::clone(&shared)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(shared.lock().queue.len(), 1);

        shared.request_shutdown();
        worker.join();
    }
}
