/*!
 * Blocking FIFO Queue
 *
 * Monitor-guarded `VecDeque`, unbounded or bounded by capacity. A bounded
 * push blocks while full, per the wait-based design; `try_push*` report
 * `false`-style results instead of failing.
 */

use crate::core::clock::Deadline;
use crate::sync::section::Section;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// FIFO queue with blocking push/pop semantics.
pub struct BlockingQueue<T> {
    capacity: Option<usize>,
    items: Section<VecDeque<T>>,
}

impl<T> BlockingQueue<T> {
    /// Unbounded queue: `push` never blocks.
    pub fn new() -> Self {
        Self {
            capacity: None,
            items: Section::new(VecDeque::new()),
        }
    }

    /// Bounded queue: `push` blocks while `capacity` items are queued.
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");
        Self {
            capacity: Some(capacity),
            items: Section::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append an item, blocking until capacity is available.
    pub fn push(&self, item: T) {
        self.items.run(|ex| {
            if let Some(capacity) = self.capacity {
                ex.wait(|q| q.len() < capacity);
            }
            ex.push_back(item);
        });
    }

    /// Append without blocking; gives the item back when full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.try_push_for(item, Duration::ZERO)
    }

    /// Append, giving up after `timeout`; gives the item back on timeout.
    pub fn try_push_for(&self, item: T, timeout: Duration) -> Result<(), T> {
        self.items.run(|ex| {
            if let Some(capacity) = self.capacity {
                if !ex.wait_for(timeout, |q| q.len() < capacity) {
                    return Err(item);
                }
            }
            ex.push_back(item);
            Ok(())
        })
    }

    /// Remove the front item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        self.items.run(|ex| loop {
            if let Some(item) = ex.pop_front() {
                return item;
            }
            ex.park_until(Deadline::Never);
        })
    }

    /// Remove the front item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        self.items.run(|ex| ex.pop_front())
    }

    /// Remove the front item, giving up after `timeout`.
    pub fn pop_for(&self, timeout: Duration) -> Option<T> {
        self.items.run(|ex| {
            let deadline = Deadline::after(Instant::now(), timeout);
            loop {
                if let Some(item) = ex.pop_front() {
                    return Some(item);
                }
                if !ex.park_until(deadline) {
                    return ex.pop_front();
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.items.run(|ex| ex.len())
    }

    pub fn is_empty(&self) -> bool {
        self.items.run(|ex| ex.is_empty())
    }
}

impl<T> Default for BlockingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = BlockingQueue::new();
        queue.push(1);
        queue.push(2);
        queue.push(3);
        assert_eq!(queue.pop(), 1);
        assert_eq!(queue.pop(), 2);
        assert_eq!(queue.pop(), 3);
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(BlockingQueue::new());
        let queue_clone = queue.clone();

        let consumer = thread::spawn(move || queue_clone.pop());

        thread::sleep(Duration::from_millis(50));
        queue.push(42);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn test_bounded_push_blocks_at_capacity() {
        let queue = Arc::new(BlockingQueue::bounded(1));
        queue.push("a");
        assert!(queue.try_push("b").is_err());

        let queue_clone = queue.clone();
        let producer = thread::spawn(move || queue_clone.push("b"));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.pop(), "a");
        producer.join().unwrap();
        assert_eq!(queue.pop(), "b");
    }

    #[test]
    fn test_pop_for_timeout() {
        let queue = BlockingQueue::<u32>::new();
        let start = Instant::now();
        assert_eq!(queue.pop_for(Duration::from_millis(50)), None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
