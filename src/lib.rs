/*!
 * monitor-kit
 * Monitor-based synchronization primitives for multi-threaded programs:
 * exclusive sections with broadcast-on-exit, a generalized predicate wait
 * protocol, ticketed signaling, and a deadline-driven timer subsystem
 * (delay queue, expiring map, delayed executor).
 */

pub mod core;
pub mod sync;
pub mod timer;

// Re-exports
pub use crate::core::clock::{Clock, ClockRef, Deadline, MonotonicClock};
pub use sync::{Exclusive, Section, Signal};
pub use timer::{
    DelayExecutor, DelayQueue, ExpireMap, QueueClosed, Task, TaskRunner, ThreadRunner, TimerHandle,
};
