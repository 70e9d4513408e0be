/*!
 * Events
 *
 * Manual-reset and auto-reset boolean events.
 */

use crate::sync::section::Section;
use std::time::Duration;

/// Manual-reset event: once set, every wait passes until `reset`.
#[derive(Default)]
pub struct Event {
    cell: Section<bool>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.cell.run(|ex| **ex = true);
    }

    pub fn reset(&self) {
        self.cell.run(|ex| **ex = false);
    }

    pub fn is_set(&self) -> bool {
        self.cell.run(|ex| **ex)
    }

    pub fn wait(&self) {
        self.cell.run(|ex| ex.wait(|set| *set));
    }

    /// `false` if the event was not set before `timeout` elapsed.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.cell.run(|ex| ex.wait_for(timeout, |set| *set))
    }
}

/// Auto-reset event: each passing wait consumes the signal, so one `set`
/// admits exactly one waiter.
#[derive(Default)]
pub struct AutoEvent {
    cell: Section<bool>,
}

impl AutoEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.cell.run(|ex| **ex = true);
    }

    pub fn wait(&self) {
        self.cell.run(|ex| {
            ex.wait(|set| *set);
            **ex = false;
        });
    }

    /// `false` if no signal arrived before `timeout`; the signal is
    /// consumed only on success.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.cell.run(|ex| {
            if ex.wait_for(timeout, |set| *set) {
                **ex = false;
                true
            } else {
                false
            }
        })
    }
}
