use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::item::WorkItem;

/// Free list of recyclable work items.
///
/// Sized by recent peak demand: `purge` only trims once the list has shrunk
/// by more than `tolerance` since the previous purge.
#[derive(Debug)]
pub struct ItemPool {
    free: VecDeque<Arc<WorkItem>>,
    last_size: usize,
    tolerance: usize,
}

impl ItemPool {
    pub fn new(tolerance: usize) -> Self {
        Self {
            free: VecDeque::new(),
            last_size: 0,
            tolerance,
        }
    }

    /// Take a recycled item, or allocate a new pooled one.
    pub fn acquire(&mut self) -> Arc<WorkItem> {
        self.free
            .pop_front()
            .unwrap_or_else(|| Arc::new(WorkItem::with_pooling(true)))
    }

    /// Reset and keep a pooled item. Caller-owned items are not kept.
    /// Returns whether the item went back into the free list.
    pub fn release(&mut self, item: Arc<WorkItem>) -> bool {
        if !item.is_pooled() {
            return false;
        }
        item.reset();
        self.free.push_back(item);
        true
    }

    /// Trim the free list by the amount it shrank since the last purge, if
    /// that amount exceeds the tolerance. Returns the number of items dropped.
    pub fn purge(&mut self) -> usize {
        let current = self.free.len();
        let mut trimmed = 0;

        if self.last_size > current && self.last_size - current > self.tolerance {
            let difference = self.last_size - current;
            trimmed = difference.min(self.free.len());
            self.free.drain(..trimmed);
            debug!(trimmed, remaining = self.free.len(), "Trimmed work item pool");
        }

        self.last_size = current;
        trimmed
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }

    pub fn set_tolerance(&mut self, tolerance: usize) {
        self.tolerance = tolerance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(pool: &mut ItemPool, n: usize) {
        let items: Vec<_> = (0..n).map(|_| pool.acquire()).collect();
        for item in items {
            pool.release(item);
        }
    }

    #[test]
    fn acquire_allocates_pooled_items() {
        let mut pool = ItemPool::new(10);
        let item = pool.acquire();
        assert!(item.is_pooled());
        assert!(pool.is_empty());
    }

    #[test]
    fn release_recycles_same_instance() {
        let mut pool = ItemPool::new(10);
        let item = pool.acquire();
        item.set_priority(4);
        assert!(pool.release(Arc::clone(&item)));

        let again = pool.acquire();
        assert!(Arc::ptr_eq(&item, &again));
        assert_eq!(again.priority(), 0);
    }

    #[test]
    fn caller_owned_items_are_not_kept() {
        let mut pool = ItemPool::new(10);
        assert!(!pool.release(Arc::new(WorkItem::new())));
        assert!(pool.is_empty());
    }

    #[test]
    fn small_shrink_is_tolerated() {
        let mut pool = ItemPool::new(10);
        fill(&mut pool, 20);
        assert_eq!(pool.purge(), 0);

        // Ten items out: shrink equals the tolerance, not above it.
        let taken: Vec<_> = (0..10).map(|_| pool.acquire()).collect();
        assert_eq!(pool.purge(), 0);
        assert_eq!(pool.len(), 10);
        drop(taken);
    }

    #[test]
    fn large_shrink_trims_by_difference() {
        let mut pool = ItemPool::new(10);
        fill(&mut pool, 40);
        pool.purge();

        let _taken: Vec<_> = (0..15).map(|_| pool.acquire()).collect();
        // Shrunk 40 -> 25, difference 15 > 10, so 15 more are dropped.
        assert_eq!(pool.purge(), 15);
        assert_eq!(pool.len(), 10);

        // Baseline is the size observed before trimming (25), so the next
        // purge sees a shrink of 15 again.
        assert_eq!(pool.purge(), 10);
        assert!(pool.is_empty());
    }

    #[test]
    fn growth_never_trims() {
        let mut pool = ItemPool::new(0);
        fill(&mut pool, 5);
        assert_eq!(pool.purge(), 0);
        fill(&mut pool, 10);
        assert_eq!(pool.purge(), 0);
    }
}
