/*!
 * Core Module
 * Fundamental time types shared by every primitive
 */

pub mod clock;

// Re-export for convenience
pub use clock::{Clock, ClockRef, Deadline, MonotonicClock};
