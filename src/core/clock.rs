/*!
 * Monotonic Time
 *
 * Clock seam and absolute deadlines for every timed wait in the crate.
 *
 * # Design
 *
 * Relative timeouts are converted to an absolute [`Deadline`] exactly once,
 * at the call boundary. Long waits then compare against that fixed instant,
 * so repeated `now()` reads during a wait cannot drift the cutoff. Deadlines
 * are monotonic (`Instant`-based) and unaffected by wall-clock adjustments.
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic time.
///
/// Implementations must be monotonically non-decreasing. The timer
/// components accept an injected clock so tests can slow or skew time
/// without touching the scheduler.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Default clock backed by `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Shared clock handle consumed by the timer components.
pub type ClockRef = Arc<dyn Clock>;

/// Absolute point in monotonic time after which a wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Give up once this instant has passed.
    At(Instant),
    /// Block indefinitely.
    Never,
}

impl Deadline {
    /// Convert a relative timeout to an absolute deadline.
    ///
    /// A zero duration yields an already-elapsed deadline: the wait
    /// degenerates to a single non-blocking predicate probe.
    #[inline]
    pub fn after(now: Instant, timeout: Duration) -> Self {
        match now.checked_add(timeout) {
            Some(at) => Deadline::At(at),
            // Timeout too large to represent; block indefinitely instead.
            None => Deadline::Never,
        }
    }

    /// Whether the deadline has passed at `now`.
    #[inline]
    pub fn elapsed(&self, now: Instant) -> bool {
        match self {
            Deadline::At(at) => now >= *at,
            Deadline::Never => false,
        }
    }

    /// The earlier of two deadlines.
    #[inline]
    pub fn min(self, other: Deadline) -> Deadline {
        match (self, other) {
            (Deadline::At(a), Deadline::At(b)) => Deadline::At(a.min(b)),
            (Deadline::At(a), Deadline::Never) => Deadline::At(a),
            (Deadline::Never, other) => other,
        }
    }
}

impl From<Instant> for Deadline {
    fn from(at: Instant) -> Self {
        Deadline::At(at)
    }
}
