/*!
 * Guarded Cells
 *
 * A monitor-guarded counter and a compare-and-swap value cell. Every
 * mutation broadcasts on exit, so threads waiting on a threshold or a
 * particular value re-check immediately.
 */

use crate::sync::section::Section;
use std::time::Duration;

/// Monitor-guarded integer counter.
#[derive(Default)]
pub struct Counter {
    value: Section<i64>,
}

impl Counter {
    pub fn new(value: i64) -> Self {
        Self {
            value: Section::new(value),
        }
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: i64) -> i64 {
        self.value.run(|ex| {
            **ex += delta;
            **ex
        })
    }

    pub fn set(&self, value: i64) {
        self.value.run(|ex| **ex = value);
    }

    pub fn get(&self) -> i64 {
        self.value.run(|ex| **ex)
    }

    /// Block until the counter exceeds `threshold`.
    pub fn wait_until_exceeds(&self, threshold: i64) {
        self.value.run(|ex| ex.wait(|v| *v > threshold));
    }

    /// Bounded variant; `false` if the threshold was not exceeded in time.
    pub fn wait_until_exceeds_for(&self, threshold: i64, timeout: Duration) -> bool {
        self.value.run(|ex| ex.wait_for(timeout, |v| *v > threshold))
    }
}

/// Monitor-guarded value cell with compare-and-swap.
pub struct CasCell<T> {
    value: Section<T>,
}

impl<T: PartialEq> CasCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Section::new(value),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.run(|ex| (**ex).clone())
    }

    pub fn set(&self, value: T) {
        self.value.run(|ex| **ex = value);
    }

    /// Replace the value with `new` only if it currently equals `expected`.
    pub fn compare_and_swap(&self, expected: &T, new: T) -> bool {
        self.value.run(|ex| {
            if **ex == *expected {
                **ex = new;
                true
            } else {
                false
            }
        })
    }

    /// Block until the cell holds `target`.
    pub fn wait_for_value(&self, target: &T) {
        self.value.run(|ex| ex.wait(|v| *v == *target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter_threshold_wait() {
        let counter = Arc::new(Counter::new(0));
        let counter_clone = counter.clone();

        let waiter = thread::spawn(move || counter_clone.wait_until_exceeds(2));

        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.add(1), 1);
        assert_eq!(counter.add(2), 3);
        waiter.join().unwrap();
    }

    #[test]
    fn test_wait_for_value_blocks_until_match() {
        let cell = Arc::new(CasCell::new("loading"));
        let cell_clone = cell.clone();

        let waiter = thread::spawn(move || cell_clone.wait_for_value(&"ready"));

        thread::sleep(Duration::from_millis(30));
        // An intermediate value must not release the waiter.
        cell.set("warming");
        thread::sleep(Duration::from_millis(30));
        cell.set("ready");

        waiter.join().unwrap();
        assert_eq!(cell.get(), "ready");
    }

    #[test]
    fn test_cas_swaps_only_on_match() {
        let cell = CasCell::new("idle");
        assert!(!cell.compare_and_swap(&"busy", "done"));
        assert!(cell.compare_and_swap(&"idle", "busy"));
        assert_eq!(cell.get(), "busy");
        // Second attempt against the old value fails.
        assert!(!cell.compare_and_swap(&"idle", "busy"));
    }
}
