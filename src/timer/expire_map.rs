/*!
 * Expire Map
 *
 * Keyed value store with per-key, cancellable, re-armable expiration.
 *
 * # Design
 *
 * The table and a `DelayQueue` of keys are guarded independently; no
 * operation holds both monitors at once, so there is no lock ordering to
 * get wrong. Each outstanding schedule carries a map-wide epoch stamped
 * into the entry *before* the timer is enqueued. The reaper deletes an
 * entry only when the fired schedule's epoch still matches the entry's —
 * a schedule superseded by a re-arm (or orphaned by a concurrent remove)
 * fires as a no-op. At most one schedule is armed per key; re-arming
 * cancels the prior timer first.
 *
 * The reaper is a single named thread started at construction and joined
 * on drop, after closing the timer queue.
 */

use crate::core::clock::{ClockRef, MonotonicClock};
use crate::sync::Section;
use crate::timer::delay_queue::{DelayQueue, QueueClosed, TimerHandle};
use ahash::AHashMap;
use log::debug;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Armed {
    /// Schedule identity; compared against the fired schedule's epoch.
    epoch: u64,
    /// Cancellation handle, installed once the timer is enqueued.
    timer: Option<TimerHandle>,
}

struct Slot<V> {
    value: V,
    armed: Option<Armed>,
}

struct TableState<K, V> {
    slots: AHashMap<K, Slot<V>>,
    next_epoch: u64,
}

struct MapInner<K, V> {
    table: Section<TableState<K, V>>,
    timers: DelayQueue<(K, u64)>,
}

/// Key-value store with per-key expiration scheduling.
///
/// `put` never touches scheduling; only [`remove`](Self::remove) and
/// [`remove_after`](Self::remove_after) do. A key stays readable until its
/// timer fires.
///
/// # Examples
///
/// ```
/// use monitor_kit::timer::ExpireMap;
/// use std::time::Duration;
///
/// let map = ExpireMap::new();
/// map.put("session", 1);
/// map.remove_after("session", Duration::from_millis(20));
///
/// assert_eq!(map.get(&"session"), Some(1));
/// std::thread::sleep(Duration::from_millis(80));
/// assert!(!map.contains(&"session"));
/// ```
pub struct ExpireMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    inner: Arc<MapInner<K, V>>,
    reaper: Option<JoinHandle<()>>,
}

impl<K, V> ExpireMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Create a map whose expiration timers read time from `clock`.
    pub fn with_clock(clock: ClockRef) -> Self {
        let inner = Arc::new(MapInner {
            table: Section::new(TableState {
                slots: AHashMap::new(),
                next_epoch: 0,
            }),
            timers: DelayQueue::with_clock(clock),
        });

        let worker = Arc::clone(&inner);
        let reaper = thread::Builder::new()
            .name("expire-map-reaper".into())
            .spawn(move || reap_loop(&worker))
            .expect("failed to spawn expire-map reaper thread");

        Self {
            inner,
            reaper: Some(reaper),
        }
    }

    /// Look up a key. Does not affect scheduling.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner
            .table
            .run(|ex| ex.slots.get(key).map(|slot| slot.value.clone()))
    }

    /// Whether the key is present. Does not affect scheduling.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.table.run(|ex| ex.slots.contains_key(key))
    }

    pub fn len(&self) -> usize {
        self.inner.table.run(|ex| ex.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.table.run(|ex| ex.slots.is_empty())
    }

    /// Upsert the value for a key. A live timer on the key is untouched:
    /// only the remove path mutates scheduling.
    pub fn put(&self, key: K, value: V) {
        self.inner.table.run(|ex| match ex.slots.entry(key) {
            Entry::Occupied(mut occupied) => occupied.get_mut().value = value,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { value, armed: None });
            }
        });
    }

    /// Delete the entry immediately, cancelling any outstanding timer.
    pub fn remove(&self, key: &K) -> Option<V> {
        let slot = self.inner.table.run(|ex| ex.slots.remove(key))?;
        if let Some(Armed { timer: Some(handle), .. }) = slot.armed {
            // May already have fired; cancel is a no-op then, and the
            // orphaned schedule reaps nothing.
            self.inner.timers.cancel(&handle);
        }
        Some(slot.value)
    }

    /// Schedule the entry to be deleted after `ttl`, superseding any prior
    /// schedule for the key (at most one timer per key). A zero `ttl`
    /// deletes immediately. Returns `false` if the key is absent.
    pub fn remove_after(&self, key: K, ttl: Duration) -> bool {
        if ttl.is_zero() {
            return self.remove(&key).is_some();
        }

        // Arm the new epoch before the timer exists, so a schedule that
        // fires instantly still finds its identity in place.
        let armed = self.inner.table.run(|ex| {
            let state = &mut **ex;
            let slot = state.slots.get_mut(&key)?;
            state.next_epoch += 1;
            let epoch = state.next_epoch;
            let prior = slot.armed.replace(Armed { epoch, timer: None });
            Some((epoch, prior))
        });
        let Some((epoch, prior)) = armed else {
            return false;
        };

        if let Some(Armed { timer: Some(handle), .. }) = prior {
            self.inner.timers.cancel(&handle);
        }

        let handle = match self.inner.timers.enqueue((key.clone(), epoch), ttl) {
            Ok(handle) => handle,
            // Only drop() closes the queue; unreachable through &self.
            Err(QueueClosed) => return false,
        };

        // Install the cancellation handle, unless the schedule already
        // fired or was superseded in the window above.
        let installed = self.inner.table.run(|ex| match ex.slots.get_mut(&key) {
            Some(slot) => match slot.armed.as_mut() {
                Some(armed) if armed.epoch == epoch => {
                    armed.timer = Some(handle);
                    true
                }
                _ => false,
            },
            None => false,
        });
        if !installed {
            self.inner.timers.cancel(&handle);
        }
        true
    }
}

/// Drains fired schedules and applies the immediate-deletion path for each,
/// skipping schedules that no longer match their entry.
fn reap_loop<K, V>(inner: &MapInner<K, V>)
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    loop {
        match inner.timers.dequeue_expired() {
            Ok(((key, epoch), _handle)) => {
                inner.table.run(|ex| {
                    let current = ex
                        .slots
                        .get(&key)
                        .map(|slot| slot.armed.as_ref().is_some_and(|armed| armed.epoch == epoch));
                    match current {
                        Some(true) => {
                            ex.slots.remove(&key);
                        }
                        // Re-armed after this schedule was created; the
                        // newer timer owns the entry now.
                        Some(false) => debug!("stale expiration fired for superseded schedule"),
                        None => {}
                    }
                });
            }
            Err(QueueClosed) => break,
        }
    }
    debug!("expire-map reaper stopped");
}

impl<K, V> Default for ExpireMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for ExpireMap<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    fn drop(&mut self) {
        self.inner.timers.close();
        if let Some(reaper) = self.reaper.take() {
            let _ = reaper.join();
        }
    }
}
