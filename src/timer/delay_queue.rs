/*!
 * Delay Queue
 *
 * Monitor-guarded priority queue of (value, deadline) entries. `dequeue`
 * blocks until the queue is non-empty AND the earliest deadline has
 * elapsed; entries come out in non-decreasing deadline order, FIFO among
 * equal deadlines.
 *
 * # Design
 *
 * Ordering lives in a binary heap keyed `(deadline, sequence)`; the
 * sequence is a monotonic insertion id, so ties resolve in arrival order
 * and double as stable cancellation handles. Cancellation removes the
 * entry from a live-id index and leaves the heap node behind; dequeue
 * skips stale nodes when they surface (lazy deletion, O(log n) amortized,
 * no pointer-based iterators under concurrent structural change).
 *
 * A blocked dequeuer parks against the *current* head's deadline and
 * recomputes it after every wake: every completing operation on the
 * section broadcasts, so inserting an entry earlier than the one being
 * waited on re-targets all sleepers.
 */

use crate::core::clock::{ClockRef, Deadline, MonotonicClock};
use crate::sync::Section;
use ahash::AHashMap;
use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// The queue was closed; no further entries will be scheduled or produced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("delay queue is closed")]
pub struct QueueClosed;

/// Stable reference to a scheduled entry, used for cancellation.
///
/// Stays valid until the entry is dequeued or cancelled; after that every
/// `cancel` against it is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Heap ordering key: ascending deadline, ties by insertion sequence.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct HeapKey {
    deadline: Instant,
    id: u64,
}

struct LiveEntry<V> {
    value: V,
}

struct QueueState<V> {
    heap: BinaryHeap<Reverse<HeapKey>>,
    live: AHashMap<u64, LiveEntry<V>>,
    next_id: u64,
    /// Cancelled entries whose heap nodes have not surfaced yet.
    stale: usize,
    closed: bool,
}

impl<V> QueueState<V> {
    /// Rebuild the heap once stale nodes dominate, so cancel-heavy
    /// workloads do not accumulate dead nodes indefinitely.
    fn compact_if_needed(&mut self) {
        if self.stale > 64 && self.stale > self.live.len() {
            let live = &self.live;
            self.heap.retain(|Reverse(key)| live.contains_key(&key.id));
            self.stale = 0;
        }
    }
}

/// Deadline-ordered blocking priority queue.
///
/// # Examples
///
/// ```
/// use monitor_kit::timer::DelayQueue;
/// use std::time::Duration;
///
/// let queue = DelayQueue::new();
/// queue.enqueue("b", Duration::from_millis(20)).unwrap();
/// queue.enqueue("a", Duration::from_millis(5)).unwrap();
///
/// // Earliest deadline first, and not before it has elapsed.
/// assert_eq!(queue.dequeue().unwrap(), "a");
/// assert_eq!(queue.dequeue().unwrap(), "b");
/// ```
pub struct DelayQueue<V> {
    state: Section<QueueState<V>>,
    clock: ClockRef,
}

impl<V> DelayQueue<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Create a queue reading time from `clock`.
    pub fn with_clock(clock: ClockRef) -> Self {
        Self {
            state: Section::new(QueueState {
                heap: BinaryHeap::new(),
                live: AHashMap::new(),
                next_id: 0,
                stale: 0,
                closed: false,
            }),
            clock,
        }
    }

    /// Insert `value` with a deadline of `now + delay`; never blocks.
    ///
    /// The completion broadcast wakes every blocked dequeuer so each one
    /// re-targets the (possibly new) head deadline.
    pub fn enqueue(&self, value: V, delay: Duration) -> Result<TimerHandle, QueueClosed> {
        let now = self.clock.now();
        // Instant overflows only for absurd delays; clamp those far out.
        let deadline = now
            .checked_add(delay)
            .unwrap_or_else(|| now + Duration::from_secs(86_400 * 365 * 30));

        self.state.run(|ex| {
            if ex.closed {
                return Err(QueueClosed);
            }
            let id = ex.next_id;
            ex.next_id += 1;
            ex.live.insert(id, LiveEntry { value });
            ex.heap.push(Reverse(HeapKey { deadline, id }));
            Ok(TimerHandle(id))
        })
    }

    /// Remove the entry if it is still scheduled.
    ///
    /// Idempotent: returns `true` only when this call removed the entry;
    /// an already-dequeued or already-cancelled handle is a no-op.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        // The heap node stays behind and is skipped when it surfaces.
        self.state.run(|ex| {
            let removed = ex.live.remove(&handle.0).is_some();
            if removed {
                ex.stale += 1;
                ex.compact_if_needed();
            }
            removed
        })
    }

    /// Remove and return the head value, blocking until its deadline has
    /// elapsed.
    pub fn dequeue(&self) -> Result<V, QueueClosed> {
        loop {
            if let Some((value, _)) = self.dequeue_entry(Deadline::Never)? {
                return Ok(value);
            }
        }
    }

    /// Like [`dequeue`](Self::dequeue), but gives up after `timeout`;
    /// `None` means nothing became ready in time.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<Option<V>, QueueClosed> {
        let give_up = Deadline::after(self.clock.now(), timeout);
        Ok(self.dequeue_entry(give_up)?.map(|(value, _)| value))
    }

    /// Non-blocking probe: the head value if its deadline has elapsed.
    pub fn try_dequeue(&self) -> Option<V> {
        let now = Deadline::At(self.clock.now());
        match self.dequeue_entry(now) {
            Ok(entry) => entry.map(|(value, _)| value),
            Err(QueueClosed) => None,
        }
    }

    /// Blocking dequeue that also reports which schedule fired, so callers
    /// holding handles can detect stale schedules.
    pub(crate) fn dequeue_expired(&self) -> Result<(V, TimerHandle), QueueClosed> {
        loop {
            if let Some(entry) = self.dequeue_entry(Deadline::Never)? {
                return Ok(entry);
            }
        }
    }

    /// Core wait loop: pops the head once it is both live and due,
    /// re-parking against the recomputed head deadline after every wake.
    fn dequeue_entry(&self, give_up: Deadline) -> Result<Option<(V, TimerHandle)>, QueueClosed> {
        self.state.run(|ex| loop {
            if ex.closed {
                return Err(QueueClosed);
            }

            // Shed heap nodes whose entries were cancelled.
            {
                let state = &mut **ex;
                while let Some(Reverse(head)) = state.heap.peek() {
                    if state.live.contains_key(&head.id) {
                        break;
                    }
                    state.heap.pop();
                    state.stale = state.stale.saturating_sub(1);
                }
            }

            let now = self.clock.now();
            let head_deadline = match ex.heap.peek() {
                Some(Reverse(head)) if head.deadline <= now => {
                    let id = head.id;
                    ex.heap.pop();
                    match ex.live.remove(&id) {
                        Some(entry) => return Ok(Some((entry.value, TimerHandle(id)))),
                        // Pruned above while live; unreachable in practice,
                        // but a stale node is never an error.
                        None => continue,
                    }
                }
                Some(Reverse(head)) => Deadline::At(head.deadline),
                None => Deadline::Never,
            };

            if give_up.elapsed(now) {
                return Ok(None);
            }

            // Wake on the head coming due, on any sibling operation's exit
            // broadcast (enqueue may have installed an earlier head), or on
            // the caller's own deadline; recompute everything afterwards.
            ex.park_until(head_deadline.min(give_up));
        })
    }

    /// Scheduled (not yet dequeued or cancelled) entry count.
    pub fn len(&self) -> usize {
        self.state.run(|ex| ex.live.len())
    }

    pub fn is_empty(&self) -> bool {
        self.state.run(|ex| ex.live.is_empty())
    }

    /// Close the queue: drops pending entries, wakes every blocked
    /// dequeuer with `QueueClosed`, and fails later operations. Idempotent.
    pub fn close(&self) {
        self.state.run(|ex| {
            if ex.closed {
                return;
            }
            ex.closed = true;
            let dropped = ex.live.len();
            ex.live.clear();
            ex.heap.clear();
            if dropped > 0 {
                debug!("delay queue closed with {dropped} pending entries dropped");
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.state.run(|ex| ex.closed)
    }
}

impl<V> Default for DelayQueue<V> {
    fn default() -> Self {
        Self::new()
    }
}
