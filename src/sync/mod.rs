/*!
 * Monitor Primitives
 *
 * The monitor execution discipline and everything layered directly on it:
 * - `Section`: per-instance mutual exclusion with broadcast-on-exit
 * - `Exclusive`: the wait protocol (predicate loops, timed parking)
 * - `Signal`: ticketed wake-ups safe against missed wakeups
 * - `primitives`: derived monitors (events, barriers, semaphore, queues)
 */

pub mod primitives;
mod section;
mod signal;

// Re-export public API
pub use section::{Exclusive, Section};
pub use signal::Signal;
