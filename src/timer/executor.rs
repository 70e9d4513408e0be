/*!
 * Delay Executor
 *
 * Background dispatcher for deferred work items. Items with a delay sit in
 * a `DelayQueue`; a single dispatcher thread drains the queue and hands
 * ready items to an external [`TaskRunner`]. Execution itself — threading,
 * retries, payload failures — is the runner's concern; this component only
 * guarantees that items are dispatched no earlier than their deadline and
 * that one bad item cannot stop future dispatches.
 */

use crate::core::clock::{ClockRef, MonotonicClock};
use crate::timer::delay_queue::{DelayQueue, QueueClosed, TimerHandle};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A deferred work item.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// External task-execution collaborator.
///
/// `submit` is fire-and-forget: the executor does not inspect the outcome,
/// and the runner may run items on further threads.
pub trait TaskRunner: Send + Sync + 'static {
    fn submit(&self, task: Task);
}

/// Thread-per-task runner; the default collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRunner;

impl TaskRunner for ThreadRunner {
    fn submit(&self, task: Task) {
        if let Err(err) = thread::Builder::new()
            .name("delay-executor-task".into())
            .spawn(task)
        {
            error!("failed to spawn task thread: {err}");
        }
    }
}

/// Deadline-driven dispatcher over an external task runner.
///
/// # Examples
///
/// ```
/// use monitor_kit::timer::{DelayExecutor, ThreadRunner};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let executor = DelayExecutor::new(Arc::new(ThreadRunner));
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
///
/// executor.execute_after(move || flag.store(true, Ordering::SeqCst),
///                        Duration::from_millis(10));
///
/// std::thread::sleep(Duration::from_millis(200));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct DelayExecutor {
    queue: Arc<DelayQueue<Task>>,
    runner: Arc<dyn TaskRunner>,
    dispatcher: Option<JoinHandle<()>>,
}

impl DelayExecutor {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self::with_clock(runner, Arc::new(MonotonicClock))
    }

    /// Create an executor whose delays read time from `clock`.
    pub fn with_clock(runner: Arc<dyn TaskRunner>, clock: ClockRef) -> Self {
        let queue = Arc::new(DelayQueue::with_clock(clock));

        let worker_queue = Arc::clone(&queue);
        let worker_runner = Arc::clone(&runner);
        let dispatcher = thread::Builder::new()
            .name("delay-executor-dispatcher".into())
            .spawn(move || dispatch_loop(&worker_queue, worker_runner.as_ref()))
            .expect("failed to spawn delay-executor dispatcher thread");

        Self {
            queue,
            runner,
            dispatcher: Some(dispatcher),
        }
    }

    /// Dispatch `task` to the runner immediately.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) {
        self.runner.submit(Box::new(task));
    }

    /// Dispatch `task` after `delay`. A zero delay dispatches immediately
    /// and returns no handle; otherwise the handle cancels the pending
    /// dispatch.
    pub fn execute_after(
        &self,
        task: impl FnOnce() + Send + 'static,
        delay: Duration,
    ) -> Option<TimerHandle> {
        if delay.is_zero() {
            self.execute(task);
            return None;
        }
        match self.queue.enqueue(Box::new(task), delay) {
            Ok(handle) => Some(handle),
            // Only drop() closes the queue; unreachable through &self.
            Err(QueueClosed) => {
                warn!("delayed task rejected: executor is shutting down");
                None
            }
        }
    }

    /// Cancel a pending dispatch. Idempotent; `true` only when the task
    /// was still scheduled.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        self.queue.cancel(handle)
    }

    /// Tasks scheduled but not yet dispatched.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Drop for DelayExecutor {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
    }
}

/// Drains the queue into the runner until the queue closes. A panicking
/// `submit` is isolated so one bad item cannot stop future dequeues.
fn dispatch_loop(queue: &DelayQueue<Task>, runner: &dyn TaskRunner) {
    loop {
        match queue.dequeue() {
            Ok(task) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| runner.submit(task)));
                if outcome.is_err() {
                    error!("task runner panicked during dispatch; item dropped");
                }
            }
            Err(QueueClosed) => break,
        }
    }
    debug!("delay-executor dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Runner that executes tasks inline on the dispatcher thread.
    struct InlineRunner;

    impl TaskRunner for InlineRunner {
        fn submit(&self, task: Task) {
            task();
        }
    }

    /// Runner that panics for flagged submissions.
    struct FaultyRunner {
        poisoned: Mutex<usize>,
    }

    impl TaskRunner for FaultyRunner {
        fn submit(&self, task: Task) {
            let mut poisoned = self.poisoned.lock();
            if *poisoned > 0 {
                *poisoned -= 1;
                panic!("runner rejected the task");
            }
            drop(poisoned);
            task();
        }
    }

    fn wait_for(counter: &AtomicUsize, target: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < target {
            assert!(Instant::now() < deadline, "tasks never dispatched");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_zero_delay_dispatches_immediately() {
        let executor = DelayExecutor::new(Arc::new(InlineRunner));
        let fired = Arc::new(AtomicUsize::new(0));

        let flag = fired.clone();
        let handle = executor.execute_after(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }, Duration::ZERO);

        assert!(handle.is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delayed_dispatch_waits() {
        let executor = DelayExecutor::new(Arc::new(InlineRunner));
        let fired = Arc::new(AtomicUsize::new(0));

        let start = Instant::now();
        let flag = fired.clone();
        executor.execute_after(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }, Duration::from_millis(50));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        wait_for(&fired, 1);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_cancel_pending_dispatch() {
        let executor = DelayExecutor::new(Arc::new(InlineRunner));
        let fired = Arc::new(AtomicUsize::new(0));

        let flag = fired.clone();
        let handle = executor
            .execute_after(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            }, Duration::from_millis(50))
            .unwrap();

        assert!(executor.cancel(&handle));
        assert!(!executor.cancel(&handle));

        thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_runner_panic_does_not_stop_dispatcher() {
        let executor = DelayExecutor::new(Arc::new(FaultyRunner {
            poisoned: Mutex::new(1),
        }));
        let fired = Arc::new(AtomicUsize::new(0));

        // First item panics inside the runner, second must still dispatch.
        executor.execute_after(|| {}, Duration::from_millis(10));
        let flag = fired.clone();
        executor.execute_after(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        }, Duration::from_millis(30));

        wait_for(&fired, 1);
    }
}
