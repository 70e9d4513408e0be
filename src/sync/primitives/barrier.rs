/*!
 * Arrival Barriers
 *
 * Threshold barriers over a monotonically increasing arrival count. The
 * auto-reset variant never rewinds the count; each arrival waits for the
 * next multiple-of-threshold boundary, so the barrier re-arms for
 * successive generations without a reset race.
 */

use crate::sync::section::Section;
use std::time::Duration;

/// One-shot barrier: `arrive` returns once `max_arrivals` threads arrived.
pub struct Barrier {
    max_arrivals: u64,
    arrivals: Section<u64>,
}

impl Barrier {
    /// `max_arrivals` must be at least 1.
    pub fn new(max_arrivals: u64) -> Self {
        assert!(max_arrivals >= 1, "barrier threshold must be at least 1");
        Self {
            max_arrivals,
            arrivals: Section::new(0),
        }
    }

    /// Record an arrival and block until the threshold is reached.
    pub fn arrive(&self) {
        let target = self.max_arrivals;
        self.arrivals.run(|ex| {
            **ex += 1;
            ex.wait(|n| *n >= target);
        });
    }

    /// Block until the threshold is reached, without arriving.
    pub fn wait(&self) {
        let target = self.max_arrivals;
        self.arrivals.run(|ex| ex.wait(|n| *n >= target));
    }

    /// Non-arriving bounded wait; `false` if the threshold was not reached
    /// in time.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let target = self.max_arrivals;
        self.arrivals.run(|ex| ex.wait_for(timeout, |n| *n >= target))
    }
}

/// Auto-reset barrier: arrivals are grouped into generations of
/// `max_arrivals`; each `arrive` returns once its own generation completes.
pub struct AutoBarrier {
    max_arrivals: u64,
    arrivals: Section<u64>,
}

impl AutoBarrier {
    /// `max_arrivals` must be at least 1.
    pub fn new(max_arrivals: u64) -> Self {
        assert!(max_arrivals >= 1, "barrier threshold must be at least 1");
        Self {
            max_arrivals,
            arrivals: Section::new(0),
        }
    }

    /// Record an arrival and block until the arrival count reaches the next
    /// multiple-of-threshold boundary at or above it.
    pub fn arrive(&self) {
        let threshold = self.max_arrivals;
        self.arrivals.run(|ex| {
            **ex += 1;
            let boundary = (**ex).div_ceil(threshold) * threshold;
            ex.wait(move |n| *n >= boundary);
        });
    }

    /// Block until the generation in progress completes (the next boundary
    /// strictly above the current count), without arriving.
    pub fn wait(&self) {
        let threshold = self.max_arrivals;
        self.arrivals.run(|ex| {
            let boundary = (**ex / threshold + 1) * threshold;
            ex.wait(move |n| *n >= boundary);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_barrier_releases_at_threshold() {
        let barrier = Arc::new(Barrier::new(3));
        let released = Arc::new(AtomicUsize::new(0));

        let arrivers: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                let released = released.clone();
                thread::spawn(move || {
                    barrier.arrive();
                    released.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(released.load(Ordering::SeqCst), 0);

        barrier.arrive();
        for arriver in arrivers {
            arriver.join().unwrap();
        }
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_auto_barrier_next_generation() {
        let barrier = Arc::new(AutoBarrier::new(2));

        // First generation: two arrivals release each other.
        let barrier_clone = barrier.clone();
        let first = thread::spawn(move || barrier_clone.arrive());
        thread::sleep(Duration::from_millis(50));
        barrier.arrive();
        first.join().unwrap();

        // Third arrival starts a new generation and must block alone.
        let barrier_clone = barrier.clone();
        let blocked = Arc::new(AtomicUsize::new(0));
        let blocked_clone = blocked.clone();
        let third = thread::spawn(move || {
            barrier_clone.arrive();
            blocked_clone.store(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(100));
        assert_eq!(blocked.load(Ordering::SeqCst), 0);

        barrier.arrive();
        third.join().unwrap();
        assert_eq!(blocked.load(Ordering::SeqCst), 1);
    }
}
