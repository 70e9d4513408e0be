/*!
 * Ticketed Signal
 *
 * Missed-wakeup-safe one-shot and cohort signaling.
 *
 * # Design
 *
 * Each waiter captures a monotonically increasing 64-bit ticket while it
 * still holds exclusivity, then parks. A wake releases tickets below a
 * watermark: `notify_one` advances the watermark by one, `notify_all`
 * advances it past every ticket issued so far. Because the ticket is taken
 * before exclusivity is released, a signal sent between admission and
 * parking is never lost.
 *
 * "Release every waiter, present and future, until reset" is modeled as a
 * boolean latch, not as watermark arithmetic; there is no meaningful
 * "infinite" watermark against tickets issued later.
 *
 * Tickets of waiters that gave up (deadline elapsed, or released by the
 * latch without being covered by the watermark) are retired, and
 * `notify_one` skips them, so a wake is never spent on a waiter that
 * already left.
 */

use crate::core::clock::Deadline;
use crate::sync::section::Section;
use ahash::AHashSet;
use std::time::{Duration, Instant};

#[derive(Default)]
struct SignalState {
    /// Watermark: tickets strictly below it are released.
    signaled: u64,
    /// Tickets ever issued.
    pending: u64,
    /// Broadcast latch: releases every waiter until `reset`.
    latched: bool,
    /// Tickets whose waiters left without being covered by the watermark.
    retired: AHashSet<u64>,
}

/// Monotonically-ticketed wake mechanism.
///
/// The precise-release building block behind condition-variable and
/// auto-reset-event semantics: one `notify_one` unblocks exactly one
/// admitted waiter, in admission order.
#[derive(Default)]
pub struct Signal {
    cell: Section<SignalState>,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release the oldest still-blocked waiter, if any; otherwise the wake
    /// is stored and admits the next waiter immediately.
    pub fn notify_one(&self) {
        self.cell.run(|ex| {
            let state = &mut **ex;
            state.signaled += 1;
            // Never spend the wake on a ticket whose waiter already left.
            while state.retired.remove(&(state.signaled - 1)) {
                state.signaled += 1;
            }
        });
    }

    /// Release every waiter admitted so far. Tickets issued after this call
    /// are unaffected.
    pub fn notify_all(&self) {
        self.cell.run(|ex| {
            if ex.pending > ex.signaled {
                ex.signaled = ex.pending;
            }
            // All issued tickets are now below the watermark.
            ex.retired.clear();
        });
    }

    /// Open the broadcast latch: releases every waiter, including ones that
    /// arrive later, until [`reset`](Self::reset).
    pub fn notify_sticky(&self) {
        self.cell.run(|ex| ex.latched = true);
    }

    /// Close the broadcast latch. Watermark arithmetic is untouched.
    pub fn reset(&self) {
        self.cell.run(|ex| ex.latched = false);
    }

    /// Block until released by a wake or the latch.
    pub fn wait(&self) {
        self.wait_deadline(Deadline::Never);
    }

    /// Block until released or `timeout` elapses; `false` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_deadline(Deadline::after(Instant::now(), timeout))
    }

    /// Block until released or `deadline` passes; `false` on timeout.
    pub fn wait_until(&self, deadline: Deadline) -> bool {
        self.wait_deadline(deadline)
    }

    fn wait_deadline(&self, deadline: Deadline) -> bool {
        self.cell.run(|ex| {
            let ticket = ex.pending;
            ex.pending += 1;
            let released =
                ex.wait_until(deadline, move |s| s.latched || s.signaled > ticket);
            if ex.signaled <= ticket {
                // Timed out, or released by the latch alone: the ticket is
                // dead and must not absorb a future notify_one.
                ex.retired.insert(ticket);
            }
            released
        })
    }

    /// Number of waiters admitted but not yet covered by the watermark.
    /// Diagnostic only; racy by nature.
    pub fn waiting(&self) -> u64 {
        self.cell.run(|ex| {
            ex.pending
                .saturating_sub(ex.signaled)
                .saturating_sub(ex.retired.len() as u64)
        })
    }
}
