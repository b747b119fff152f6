use std::collections::VecDeque;
use std::sync::Arc;

use super::item::WorkItem;
use super::types::Priority;

/// Items waiting for execution, highest priority at the front.
///
/// Insertion is stable: a new item goes in front of the first entry with a
/// strictly lower priority, so equal priorities keep submission order.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    items: VecDeque<Arc<WorkItem>>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// O(n) scan for the insert position.
    pub fn insert(&mut self, item: Arc<WorkItem>) {
        let priority = item.priority();
        let position = self
            .items
            .iter()
            .position(|queued| queued.priority() < priority)
            .unwrap_or(self.items.len());
        self.items.insert(position, item);
    }

    pub fn pop_front(&mut self) -> Option<Arc<WorkItem>> {
        self.items.pop_front()
    }

    /// Pop the front item only if it is at or above `threshold`.
    pub fn pop_at_least(&mut self, threshold: Priority) -> Option<Arc<WorkItem>> {
        if self.front_priority()? >= threshold {
            self.items.pop_front()
        } else {
            None
        }
    }

    pub fn front_priority(&self) -> Option<Priority> {
        self.items.front().map(|item| item.priority())
    }

    pub fn contains(&self, item: &Arc<WorkItem>) -> bool {
        self.items.iter().any(|queued| Arc::ptr_eq(queued, item))
    }

    /// Remove a specific instance. Returns false if it is not queued.
    pub fn remove(&mut self, item: &Arc<WorkItem>) -> bool {
        match self.items.iter().position(|queued| Arc::ptr_eq(queued, item)) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(priority: Priority) -> Arc<WorkItem> {
        let item = WorkItem::new();
        item.set_priority(priority);
        Arc::new(item)
    }

    fn drain(queue: &mut PriorityQueue) -> Vec<Arc<WorkItem>> {
        std::iter::from_fn(|| queue.pop_front()).collect()
    }

    #[test]
    fn higher_priority_first_equal_in_submission_order() {
        let mut queue = PriorityQueue::new();
        let submitted = [item(5), item(1), item(5), item(3)];
        for it in &submitted {
            queue.insert(Arc::clone(it));
        }

        let drained = drain(&mut queue);
        let priorities: Vec<Priority> = drained.iter().map(|i| i.priority()).collect();
        assert_eq!(priorities, vec![5, 5, 3, 1]);
        assert!(Arc::ptr_eq(&drained[0], &submitted[0]));
        assert!(Arc::ptr_eq(&drained[1], &submitted[2]));
    }

    #[test]
    fn pop_at_least_stops_below_threshold() {
        let mut queue = PriorityQueue::new();
        queue.insert(item(4));
        queue.insert(item(2));

        assert_eq!(queue.pop_at_least(3).map(|i| i.priority()), Some(4));
        assert!(queue.pop_at_least(3).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn remove_by_identity() {
        let mut queue = PriorityQueue::new();
        let a = item(1);
        let b = item(1);
        queue.insert(Arc::clone(&a));
        queue.insert(Arc::clone(&b));

        assert!(queue.remove(&a));
        assert!(!queue.remove(&a));
        assert!(!queue.contains(&a));
        assert!(queue.contains(&b));
        assert_eq!(queue.front_priority(), Some(1));
    }

    #[test]
    fn empty_queue() {
        let mut queue = PriorityQueue::new();
        assert!(queue.is_empty());
        assert!(queue.pop_front().is_none());
        assert!(queue.pop_at_least(0).is_none());
        assert_eq!(queue.front_priority(), None);
    }
}
