//! Bounded FIFO: a single list drawn from its own fixed-capacity pool.
//!
//! No internal locking. `SyncChannel` holds one behind its mutex.

use crate::pool::{ListId, ListPool, PoolExhausted};

pub struct BoundedQueue<T> {
    pool: ListPool<T>,
    list: ListId,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, PoolExhausted> {
        let mut pool = ListPool::with_capacity(1, capacity);
        let list = pool.create()?;
        Ok(Self {
            pool,
            list,
            capacity,
        })
    }

    /// Add to the back. O(1).
    pub fn append(&mut self, item: T) -> Result<(), PoolExhausted> {
        self.pool.append(&self.list, item)
    }

    /// Take from the front. O(1).
    pub fn remove_front(&mut self) -> Option<T> {
        self.pool.remove_front(&self.list)
    }

    pub fn count(&self) -> usize {
        self.pool.count(&self.list)
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // Inspection without removal. Any append or removal may move the cursor.

    pub fn first(&mut self) -> Option<&T> {
        self.pool.first(&self.list)
    }

    pub fn last(&mut self) -> Option<&T> {
        self.pool.last(&self.list)
    }

    pub fn next(&mut self) -> Option<&T> {
        self.pool.next(&self.list)
    }

    pub fn prev(&mut self) -> Option<&T> {
        self.pool.prev(&self.list)
    }

    pub fn current(&self) -> Option<&T> {
        self.pool.current(&self.list)
    }

    /// Release the list and every node still queued. Returns how many items were undelivered.
    pub fn free(self) -> usize {
        let Self { mut pool, list, .. } = self;
        let mut undelivered = 0;
        pool.free(list, |_| undelivered += 1);
        undelivered
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("count", &self.count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::LIST_MAX_NUM_NODES;
    use rand::Rng;

    #[test]
    fn fifo_order_random_sequences() {
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let n = rng.gen_range(1..200);
            let items: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
            let mut q = BoundedQueue::new(200).unwrap();
            for &i in &items {
                q.append(i).unwrap();
            }
            let out: Vec<u64> = std::iter::from_fn(|| q.remove_front()).collect();
            assert_eq!(out, items);
            assert!(q.is_empty());
        }
    }

    #[test]
    fn interleaved_append_remove() {
        let mut q = BoundedQueue::new(2).unwrap();
        q.append("a").unwrap();
        q.append("b").unwrap();
        assert_eq!(q.remove_front(), Some("a"));
        q.append("c").unwrap();
        assert_eq!(q.remove_front(), Some("b"));
        assert_eq!(q.remove_front(), Some("c"));
        assert_eq!(q.remove_front(), None);
    }

    #[test]
    fn capacity_bound() {
        let mut q = BoundedQueue::new(LIST_MAX_NUM_NODES).unwrap();
        for i in 0..LIST_MAX_NUM_NODES {
            q.append(i).unwrap();
        }
        assert_eq!(q.count(), LIST_MAX_NUM_NODES);
        assert_eq!(q.append(0), Err(PoolExhausted::Nodes));
        assert_eq!(q.remove_front(), Some(0));
        assert!(q.append(0).is_ok());
    }

    #[test]
    fn cursor_inspection_does_not_remove() {
        let mut q = BoundedQueue::new(4).unwrap();
        q.append(1).unwrap();
        q.append(2).unwrap();
        assert_eq!(q.current(), Some(&2));
        assert_eq!(q.first(), Some(&1));
        assert_eq!(q.next(), Some(&2));
        assert_eq!(q.next(), None);
        assert_eq!(q.prev(), Some(&2));
        assert_eq!(q.last(), Some(&2));
        assert_eq!(q.count(), 2);
    }

    #[test]
    fn free_reports_undelivered() {
        let mut q = BoundedQueue::new(4).unwrap();
        q.append(1).unwrap();
        q.append(2).unwrap();
        q.remove_front();
        assert_eq!(q.free(), 1);
    }

    #[test]
    fn zero_capacity_refuses_appends() {
        let mut q = BoundedQueue::new(0).unwrap();
        assert_eq!(q.append(1), Err(PoolExhausted::Nodes));
        assert_eq!(q.capacity(), 0);
    }
}
