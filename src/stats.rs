//! Runtime operation counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and not
//! used as synchronization primitives. The lock/allocator/collective code's
//! own synchronization provides the ordering guarantees for correctness;
//! these counters are purely for monitoring.
//!
//! # Usage
//!
//! ```ignore
//! let snap = oshmem::stats::snapshot();
//! println!("collectives: {}", snap.collective_calls);
//! ```
//!
//! Obtain a [`Snapshot`] with [`snapshot()`]. Individual counter loads are
//! individually atomic but not globally consistent with each other.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    // ---- Heap allocator ----
    /// Total calls to malloc/calloc/align with size > 0.
    pub alloc_count: AtomicU64,
    /// Total calls to free with a non-null pointer.
    pub dealloc_count: AtomicU64,
    /// Total calls to realloc (after null/zero-size guards).
    pub realloc_count: AtomicU64,
    /// Sum of all requested byte sizes passed to malloc/calloc/align.
    pub alloc_bytes: AtomicU64,

    // ---- Distributed lock ----
    /// Acquires that succeeded on the first swap (no contention observed).
    pub lock_fast_acquires: AtomicU64,
    /// Acquires that had to queue behind a predecessor.
    pub lock_slow_acquires: AtomicU64,
    /// `try_acquire` calls that found the lock busy.
    pub lock_try_failures: AtomicU64,

    // ---- Collectives ----
    /// Total calls into any collective entry point.
    pub collective_calls: AtomicU64,
    /// Total rounds of peer-to-peer exchange executed across all
    /// collectives (one increment per round, not per peer).
    pub collective_rounds: AtomicU64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            alloc_count: AtomicU64::new(0),
            dealloc_count: AtomicU64::new(0),
            realloc_count: AtomicU64::new(0),
            alloc_bytes: AtomicU64::new(0),
            lock_fast_acquires: AtomicU64::new(0),
            lock_slow_acquires: AtomicU64::new(0),
            lock_try_failures: AtomicU64::new(0),
            collective_calls: AtomicU64::new(0),
            collective_rounds: AtomicU64::new(0),
        }
    }
}

pub(crate) static STATS: Stats = Stats::new();

/// A point-in-time snapshot of all runtime counters.
///
/// Fields are plain `u64` values loaded from the global atomic counters.
/// Individual fields are each atomically read, but the snapshot as a whole
/// is not globally consistent — concurrent calls may race between loads.
/// For monitoring purposes this is always sufficient.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    pub alloc_count: u64,
    pub dealloc_count: u64,
    pub realloc_count: u64,
    pub alloc_bytes: u64,
    pub lock_fast_acquires: u64,
    pub lock_slow_acquires: u64,
    pub lock_try_failures: u64,
    pub collective_calls: u64,
    pub collective_rounds: u64,
}

/// Load all counters with `Relaxed` ordering and return a [`Snapshot`].
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        alloc_count: s.alloc_count.load(Ordering::Relaxed),
        dealloc_count: s.dealloc_count.load(Ordering::Relaxed),
        realloc_count: s.realloc_count.load(Ordering::Relaxed),
        alloc_bytes: s.alloc_bytes.load(Ordering::Relaxed),
        lock_fast_acquires: s.lock_fast_acquires.load(Ordering::Relaxed),
        lock_slow_acquires: s.lock_slow_acquires.load(Ordering::Relaxed),
        lock_try_failures: s.lock_try_failures.load(Ordering::Relaxed),
        collective_calls: s.collective_calls.load(Ordering::Relaxed),
        collective_rounds: s.collective_rounds.load(Ordering::Relaxed),
    }
}
