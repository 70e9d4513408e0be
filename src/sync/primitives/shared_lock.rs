/*!
 * Shared/Exclusive Lock
 *
 * Reader/writer counters behind a single monitor, with writer preference:
 * a pending writer blocks new readers, so a stream of readers cannot
 * starve writers. RAII guards release through the same monitor, and the
 * exit broadcast hands the lock over.
 */

use crate::sync::section::Section;

#[derive(Default)]
struct LockCounts {
    readers: u64,
    writers: u64,
    pending_writers: u64,
}

/// Writer-preferring reader/writer lock built on the wait protocol.
///
/// Unlike `parking_lot::RwLock` this protects no data of its own; it is a
/// pure admission-control monitor, usable where the protected resource
/// lives elsewhere.
#[derive(Default)]
pub struct SharedLock {
    counts: Section<LockCounts>,
}

impl SharedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire shared access. Blocks while a writer holds or awaits the
    /// lock.
    pub fn read(&self) -> SharedGuard<'_> {
        self.counts.run(|ex| {
            ex.wait(|c| c.writers == 0 && c.pending_writers == 0);
            ex.readers += 1;
        });
        SharedGuard { lock: self }
    }

    /// Acquire exclusive access. Blocks while readers or another writer
    /// hold the lock; new readers queue behind this call.
    pub fn write(&self) -> WriteGuard<'_> {
        self.counts.run(|ex| {
            ex.pending_writers += 1;
            ex.wait(|c| c.writers == 0 && c.readers == 0);
            ex.pending_writers -= 1;
            ex.writers += 1;
        });
        WriteGuard { lock: self }
    }
}

/// Shared access; releases on drop.
pub struct SharedGuard<'a> {
    lock: &'a SharedLock,
}

impl Drop for SharedGuard<'_> {
    fn drop(&mut self) {
        self.lock.counts.run(|ex| ex.readers -= 1);
    }
}

/// Exclusive access; releases on drop.
pub struct WriteGuard<'a> {
    lock: &'a SharedLock,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.counts.run(|ex| ex.writers -= 1);
    }
}
