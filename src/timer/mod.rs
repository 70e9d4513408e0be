/*!
 * Timer Subsystem
 *
 * Deadline-ordered scheduling built on the monitor discipline:
 * - `DelayQueue`: blocking priority queue of (value, deadline) entries
 * - `ExpireMap`: keyed store with per-key, re-armable expiration
 * - `DelayExecutor`: background dispatcher for deferred work items
 */

mod delay_queue;
mod executor;
mod expire_map;

// Re-export public API
pub use delay_queue::{DelayQueue, QueueClosed, TimerHandle};
pub use executor::{DelayExecutor, Task, TaskRunner, ThreadRunner};
pub use expire_map::ExpireMap;
