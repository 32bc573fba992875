use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Fixed-capacity FIFO buffer owned by a [`then`](super::Pipeline::then) stage.
///
/// Pushing into a full queue is a configuration error, not a stall.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an element, failing with [`Error::BufferOverflow`] when full.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.capacity {
            return Err(Error::BufferOverflow {
                capacity: self.capacity,
            });
        }
        self.items.push_back(item);
        Ok(())
    }

    /// Remove the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Draining iteration, oldest first.
impl<T> Iterator for BoundedQueue<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let mut queue = BoundedQueue::new(3);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        assert_eq!(queue.peek(), Some(&1));
        assert_eq!(queue.pop(), Some(1));
        queue.push(3).unwrap();
        assert_eq!(queue.by_ref().collect::<Vec<_>>(), vec![2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_is_an_error() {
        let mut queue = BoundedQueue::new(1);
        queue.push('a').unwrap();
        assert!(matches!(
            queue.push('b'),
            Err(Error::BufferOverflow { capacity: 1 })
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut queue = BoundedQueue::<u8>::new(0);
        assert!(queue.push(0).is_err());
        assert_eq!(queue.capacity(), 0);
    }
}
