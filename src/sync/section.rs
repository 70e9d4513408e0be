/*!
 * Exclusive Section
 *
 * The monitor execution primitive: a mutex over guarded state plus a
 * notification channel broadcast to every parked waiter whenever any
 * guarded operation exits.
 *
 * # Design
 *
 * `Section::run` acquires the lock, hands the operation an [`Exclusive`]
 * guard, and broadcasts on every exit path. The broadcast is carried by a
 * drop guard, so an early `?` return or a panic unwinding out of the
 * operation still notifies waiters before the lock is released. The
 * broadcast is unconditional: it does not inspect whether state actually
 * changed. A spurious wake costs one predicate re-check; a missed wake
 * costs a hang.
 *
 * Blocking happens only inside the wait protocol on `Exclusive`, and only
 * with the lock released. A parked thread holds no lock and cannot deadlock
 * the instance against the thread that would make its predicate true.
 */

use crate::core::clock::Deadline;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};

/// Mutual-exclusion guard over `T` with an attached notification channel.
///
/// At most one thread executes a guarded operation on a given instance at a
/// time. Every exit broadcasts, so threads blocked on a now-possibly-true
/// condition re-check it.
///
/// # Examples
///
/// ```
/// use monitor_kit::sync::Section;
/// use std::time::Duration;
///
/// let cell = Section::new(0u32);
///
/// cell.run(|ex| **ex += 1);
///
/// let ready = cell.run(|ex| ex.wait_for(Duration::from_millis(5), |n| *n > 0));
/// assert!(ready);
/// ```
pub struct Section<T> {
    state: Mutex<T>,
    exits: Condvar,
}

impl<T> Section<T> {
    /// Create a section guarding `state`.
    pub const fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            exits: Condvar::new(),
        }
    }

    /// Run `op` with exclusive access to the guarded state.
    ///
    /// All current waiters are woken when `op` exits, whether it returns
    /// normally or unwinds.
    pub fn run<R>(&self, op: impl FnOnce(&mut Exclusive<'_, T>) -> R) -> R {
        let mut exclusive = Exclusive {
            guard: self.state.lock(),
            exits: &self.exits,
        };
        // Dropped before `exclusive`: the broadcast fires on every exit
        // path, then the lock is released.
        let _broadcast = ExitBroadcast { exits: &self.exits };
        op(&mut exclusive)
    }

    /// Consume the section, returning the guarded state.
    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }
}

impl<T: Default> Default for Section<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Section<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section").field("state", &self.state).finish()
    }
}

/// Broadcasts to all parked waiters when dropped.
struct ExitBroadcast<'a> {
    exits: &'a Condvar,
}

impl Drop for ExitBroadcast<'_> {
    fn drop(&mut self) {
        self.exits.notify_all();
    }
}

/// Exclusive access to a section's state, carrying the wait protocol.
///
/// Dereferences to the guarded state. The `wait_*` methods release
/// exclusivity while blocked and re-acquire it before re-evaluating the
/// predicate, so no predicate ever runs without the lock held.
pub struct Exclusive<'a, T> {
    guard: MutexGuard<'a, T>,
    exits: &'a Condvar,
}

impl<T> Exclusive<'_, T> {
    /// Block until `pred` is observed true or `deadline` passes.
    ///
    /// Returns `true` only if the predicate was observed true before the
    /// deadline. The predicate is evaluated before blocking for the first
    /// time and after every wake; an already-elapsed deadline makes this a
    /// single non-blocking probe.
    pub fn wait_until<F>(&mut self, deadline: Deadline, mut pred: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        loop {
            if pred(&mut self.guard) {
                return true;
            }
            if deadline.elapsed(Instant::now()) {
                return false;
            }
            self.park_until(deadline);
        }
    }

    /// Block until `pred` is observed true or `timeout` elapses.
    ///
    /// The timeout converts to an absolute deadline once, at entry. A zero
    /// timeout tests the predicate once and never blocks.
    pub fn wait_for<F>(&mut self, timeout: Duration, pred: F) -> bool
    where
        F: FnMut(&mut T) -> bool,
    {
        self.wait_until(Deadline::after(Instant::now(), timeout), pred)
    }

    /// Block until `pred` is observed true, with no deadline.
    pub fn wait<F>(&mut self, pred: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        self.wait_until(Deadline::Never, pred);
    }

    /// Release exclusivity and block once, until either a broadcast from a
    /// completing sibling operation or `deadline`.
    ///
    /// Returns `false` iff the deadline elapsed. This is the building block
    /// for waits whose target deadline must be recomputed after every wake
    /// (a delay queue's head may change while we sleep).
    pub fn park_until(&mut self, deadline: Deadline) -> bool {
        match deadline {
            Deadline::Never => {
                self.exits.wait(&mut self.guard);
                true
            }
            Deadline::At(at) => {
                if Instant::now() >= at {
                    return false;
                }
                !self.exits.wait_until(&mut self.guard, at).timed_out()
            }
        }
    }

    /// Block for elapsed time only, ignoring state changes and broadcasts.
    pub fn sleep_until(&mut self, deadline: Deadline) {
        loop {
            match deadline {
                Deadline::Never => {
                    self.exits.wait(&mut self.guard);
                }
                Deadline::At(at) => {
                    if Instant::now() >= at {
                        return;
                    }
                    let _ = self.exits.wait_until(&mut self.guard, at);
                }
            }
        }
    }
}

impl<T> Deref for Exclusive<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Exclusive<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_run_is_exclusive() {
        let cell = Arc::new(Section::new(0u64));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.run(|ex| **ex += 1);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.run(|ex| **ex), 8000);
    }

    #[test]
    fn test_wait_wakes_on_sibling_exit() {
        let cell = Arc::new(Section::new(false));
        let cell_clone = cell.clone();

        let waiter = thread::spawn(move || {
            cell_clone.run(|ex| ex.wait_for(Duration::from_secs(2), |ready| *ready))
        });

        thread::sleep(Duration::from_millis(50));
        cell.run(|ex| **ex = true);

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_wait_for_timeout() {
        let cell = Section::new(());
        let start = Instant::now();
        let ok = cell.run(|ex| ex.wait_for(Duration::from_millis(50), |_| false));

        assert!(!ok);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_zero_timeout_is_a_probe() {
        let cell = Section::new(7);
        let start = Instant::now();

        assert!(cell.run(|ex| ex.wait_for(Duration::ZERO, |n| *n == 7)));
        assert!(!cell.run(|ex| ex.wait_for(Duration::ZERO, |n| *n == 8)));
        // Neither call may block.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_broadcast_on_panic_exit() {
        let cell = Arc::new(Section::new(0u32));
        let cell_clone = cell.clone();

        let waiter = thread::spawn(move || {
            cell_clone.run(|ex| ex.wait_for(Duration::from_secs(2), |n| *n > 0))
        });

        thread::sleep(Duration::from_millis(50));

        let cell_panic = cell.clone();
        let panicker = thread::spawn(move || {
            cell_panic.run(|ex| {
                **ex = 1;
                panic!("guarded operation failed");
            });
        });
        assert!(panicker.join().is_err());

        // The panicking exit must still have woken the waiter.
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_sleep_until_ignores_broadcasts() {
        let cell = Arc::new(Section::new(0u32));
        let cell_clone = cell.clone();

        let sleeper = thread::spawn(move || {
            let start = Instant::now();
            cell_clone.run(|ex| {
                ex.sleep_until(Deadline::At(Instant::now() + Duration::from_millis(100)))
            });
            start.elapsed()
        });

        // Hammer the section with state changes; the sleeper must not return
        // early for any of them.
        for _ in 0..5 {
            thread::sleep(Duration::from_millis(10));
            cell.run(|ex| **ex += 1);
        }

        let elapsed = sleeper.join().unwrap();
        assert!(elapsed >= Duration::from_millis(100));
    }
}
