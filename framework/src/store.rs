//! Latest-sample store shared between acquisition and streaming
//!
//! A single slot guarded by a mutex that is only ever taken with a bounded
//! wait. When the lock cannot be had within the bound, a publish is dropped
//! and a read reports no data. This is a lossy freshness-over-delivery
//! trade: neither side may stall the other, and a missed sample is replaced
//! by the next one anyway.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::sensors::Sample;

/// Default bound on lock acquisition
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(10);

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub published: u32,
    pub dropped_publishes: u32,
    pub missed_reads: u32,
}

pub struct LatestSampleStore {
    slot: Mutex<Option<Sample>>,
    lock_timeout: Duration,
    /// Incremented on every stored sample so readers can detect updates
    sequence: AtomicU32,
    dropped_publishes: AtomicU32,
    missed_reads: AtomicU32,
}

impl LatestSampleStore {
    pub fn new() -> Self {
        Self::with_lock_timeout(LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            lock_timeout,
            sequence: AtomicU32::new(0),
            dropped_publishes: AtomicU32::new(0),
            missed_reads: AtomicU32::new(0),
        }
    }

    /// Replace the stored sample. Returns `false` if the lock was contended
    /// past the bound and the sample was dropped.
    pub fn publish(&self, sample: Sample) -> bool {
        match self.slot.try_lock_for(self.lock_timeout) {
            Some(mut guard) => {
                *guard = Some(sample);
                self.sequence.fetch_add(1, Ordering::SeqCst);
                true
            }
            None => {
                self.dropped_publishes.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Copy of the latest sample, or `None` before the first publish or
    /// when the lock could not be taken in time.
    pub fn read(&self) -> Option<Sample> {
        match self.slot.try_lock_for(self.lock_timeout) {
            Some(guard) => *guard,
            None => {
                self.missed_reads.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Number of samples stored so far
    pub fn sequence(&self) -> u32 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            published: self.sequence(),
            dropped_publishes: self.dropped_publishes.load(Ordering::Relaxed),
            missed_reads: self.missed_reads.load(Ordering::Relaxed),
        }
    }

    /// Hold the lock from a test to simulate a stalled peer
    #[cfg(test)]
    pub(crate) fn lock_for_test(&self) -> parking_lot::MutexGuard<'_, Option<Sample>> {
        self.slot.lock()
    }
}

impl Default for LatestSampleStore {
    fn default() -> Self {
        Self::new()
    }
}
