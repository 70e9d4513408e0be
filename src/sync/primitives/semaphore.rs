/*!
 * Counting Semaphore
 */

use crate::sync::section::Section;
use std::time::Duration;

/// Counted permits; `acquire` blocks while none are available.
pub struct Semaphore {
    permits: Section<usize>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Section::new(permits),
        }
    }

    /// Take a permit, blocking until one is available.
    pub fn acquire(&self) {
        self.permits.run(|ex| {
            ex.wait(|p| *p > 0);
            **ex -= 1;
        });
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_for(Duration::ZERO)
    }

    /// Take a permit, giving up after `timeout`.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        self.permits.run(|ex| {
            if ex.wait_for(timeout, |p| *p > 0) {
                **ex -= 1;
                true
            } else {
                false
            }
        })
    }

    /// Return a permit. Completion wakes blocked acquirers.
    pub fn release(&self) {
        self.permits.run(|ex| **ex += 1);
    }

    /// Currently available permits. Diagnostic only; racy by nature.
    pub fn available(&self) -> usize {
        self.permits.run(|ex| **ex)
    }
}
