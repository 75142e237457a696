//! Bounded FIFO buffer used for delivered payloads

use std::collections::VecDeque;

/// Fixed-capacity ring buffer.
///
/// A thin wrapper around `VecDeque`: `push` is O(1) and evicts from the front
/// when full, so memory is bounded by `capacity`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append an item, returning the evicted one if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        // Capacity 0 stores nothing; the item itself is the eviction.
        if self.capacity == 0 {
            return Some(item);
        }

        let evicted = if self.items.len() == self.capacity { self.items.pop_front() } else { None };
        self.items.push_back(item);
        evicted
    }

    /// Append items in order, returning how many were evicted.
    pub fn extend<I: IntoIterator<Item = T>>(&mut self, items: I) -> usize {
        items.into_iter().filter_map(|item| self.push(item)).count()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn back(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Copy of the contents, oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

impl<'a, T> IntoIterator for &'a RingBuffer<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
