//! Fixed-capacity FIFO history

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::model::MetricSnapshot;

/// Default number of points retained per deployment
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// One entry of a deployment's metric history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDataPoint {
    /// Capture time (unix millis)
    pub timestamp: i64,
    pub snapshot: MetricSnapshot,
    pub deployment_id: String,
}

/// Append-only buffer that evicts its oldest entry once full.
///
/// Eviction is the only removal path.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Append an item, returning the evicted one if the buffer was full
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended item
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Iterate oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// The newest `n` items, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip)
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_below_capacity() {
        let mut ring = RingBuffer::new(4);
        assert!(ring.push(1).is_none());
        assert!(ring.push(2).is_none());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.latest(), Some(&2));
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut ring = RingBuffer::new(3);
        for i in 0..3 {
            ring.push(i);
        }
        assert_eq!(ring.push(3), Some(0));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_length_capped_after_many_appends() {
        let mut ring = RingBuffer::default();
        let total = DEFAULT_HISTORY_CAPACITY + 250;
        for i in 0..total {
            ring.push(i);
            assert!(ring.len() <= DEFAULT_HISTORY_CAPACITY);
        }

        assert_eq!(ring.len(), DEFAULT_HISTORY_CAPACITY);
        let held: Vec<usize> = ring.iter().copied().collect();
        let expected: Vec<usize> = (total - DEFAULT_HISTORY_CAPACITY..total).collect();
        assert_eq!(held, expected);
    }

    #[test]
    fn test_recent() {
        let mut ring = RingBuffer::new(10);
        for i in 0..6 {
            ring.push(i);
        }
        assert_eq!(ring.recent(2).copied().collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(ring.recent(50).count(), 6);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut ring = RingBuffer::new(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.capacity(), 1);
        assert_eq!(ring.latest(), Some(&"b"));
    }
}
