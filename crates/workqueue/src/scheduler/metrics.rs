use chrono::{DateTime, Utc};
use serde::Serialize;

/// Work queue operational metrics, as a point-in-time snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkQueueMetrics {
    /// Items accepted by `add_work_item`.
    pub items_submitted: u64,
    /// Items executed by any thread, main thread included.
    pub items_executed: u64,
    /// Items cancelled before a thread claimed them.
    pub items_removed: u64,
    /// Completed items swept out of the live list.
    pub items_purged: u64,
    /// Completion notifications delivered to the listener.
    pub events_sent: u64,
    /// Free-list entries dropped by pool purges.
    pub pool_trimmed: u64,
    /// Calls to the frame hook.
    pub frames: u64,
    /// Items executed by the frame hook's single-threaded fallback.
    pub fallback_executed: u64,
    /// Items waiting in the queue.
    pub queued: usize,
    /// Items submitted and not yet purged.
    pub live: usize,
    /// Recyclable items in the free list.
    pub pool_size: usize,
    /// Worker threads running.
    pub workers: usize,
    /// Whether dequeuing is currently gated.
    pub paused: bool,
    /// Start of the most recent frame.
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl WorkQueueMetrics {
    /// Items submitted but neither executed nor removed.
    pub fn outstanding(&self) -> u64 {
        self.items_submitted
            .saturating_sub(self.items_executed)
            .saturating_sub(self.items_removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics() {
        let m = WorkQueueMetrics::default();
        assert_eq!(m.items_submitted, 0);
        assert_eq!(m.workers, 0);
        assert!(!m.paused);
        assert!(m.last_frame_at.is_none());
    }

    #[test]
    fn outstanding_subtracts_executed_and_removed() {
        let m = WorkQueueMetrics {
            items_submitted: 10,
            items_executed: 6,
            items_removed: 1,
            ..WorkQueueMetrics::default()
        };
        assert_eq!(m.outstanding(), 3);
    }

    #[test]
    fn serializes_to_json() {
        let m = WorkQueueMetrics {
            frames: 3,
            ..WorkQueueMetrics::default()
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["frames"], 3);
        assert!(json["last_frame_at"].is_null());
    }
}
