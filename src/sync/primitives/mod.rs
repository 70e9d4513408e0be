/*!
 * Derived Monitors
 *
 * Thin consumers of `Section` and the wait protocol. None of these carry
 * their own blocking logic; each is a guarded state struct plus predicates.
 * They double as the acceptance surface for the core discipline.
 */

mod barrier;
mod cell;
mod event;
mod queue;
mod semaphore;
mod shared_lock;

pub use barrier::{AutoBarrier, Barrier};
pub use cell::{CasCell, Counter};
pub use event::{AutoEvent, Event};
pub use queue::BlockingQueue;
pub use semaphore::Semaphore;
pub use shared_lock::{SharedGuard, SharedLock, WriteGuard};
