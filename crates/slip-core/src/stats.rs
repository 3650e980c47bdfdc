//! Memory gauges and statistics snapshots.
//!
//! The gauges are the only allocator state the supervisor thread is
//! allowed to read while a worker mutates the heap, so every field that
//! crosses threads is an atomic. Counters use relaxed ordering; the
//! byte gauge uses sequentially consistent ordering because the memory
//! watchdog bases cancellation decisions on it.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

use serde::Serialize;

/// Live memory accounting for one context.
///
/// `soft_limit` and `hard_limit` are fixed at context creation;
/// everything else is maintained by the allocator and the collector.
#[derive(Debug)]
pub struct MemGauges {
    /// Soft byte limit; crossing it arms the next GC.
    pub soft_limit: usize,

    /// Hard byte limit; crossing it cancels the running evaluation.
    pub hard_limit: usize,

    bytes_allocated: AtomicUsize,
    list_entries: AtomicUsize,
    n_allocs: AtomicUsize,
    n_frees: AtomicUsize,
    peak_bytes: AtomicUsize,
    warned: AtomicBool,
    verbosity: AtomicI64,
}

impl MemGauges {
    pub fn new(soft_limit: usize, hard_limit: usize, verbose: bool) -> Self {
        MemGauges {
            soft_limit,
            hard_limit,
            bytes_allocated: AtomicUsize::new(0),
            list_entries: AtomicUsize::new(0),
            n_allocs: AtomicUsize::new(0),
            n_frees: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            warned: AtomicBool::new(false),
            verbosity: AtomicI64::new(i64::from(verbose)),
        }
    }

    /// Bytes currently charged to the context.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated.load(Ordering::SeqCst)
    }

    /// Number of live allocation records.
    pub fn list_entries(&self) -> usize {
        self.list_entries.load(Ordering::Relaxed)
    }

    pub fn n_allocs(&self) -> usize {
        self.n_allocs.load(Ordering::Relaxed)
    }

    pub fn n_frees(&self) -> usize {
        self.n_frees.load(Ordering::Relaxed)
    }

    pub fn peak_bytes(&self) -> usize {
        self.peak_bytes.load(Ordering::Relaxed)
    }

    /// Charge `size` bytes for a fresh cell and update the high-water
    /// mark and allocation counter.
    pub(crate) fn charge(&self, size: usize) {
        let now = self.bytes_allocated.fetch_add(size, Ordering::SeqCst) + size;
        self.peak_bytes.fetch_max(now, Ordering::Relaxed);
        self.n_allocs.fetch_add(1, Ordering::Relaxed);
    }

    /// Release `size` bytes for a freed cell.
    pub(crate) fn release(&self, size: usize) {
        self.bytes_allocated.fetch_sub(size, Ordering::SeqCst);
        self.n_frees.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_list_entries(&self, entries: usize) {
        self.list_entries.store(entries, Ordering::Relaxed);
    }

    /// Soft-limit warning latch. Returns true when this call armed it.
    pub(crate) fn latch_warned(&self) -> bool {
        !self.warned.swap(true, Ordering::Relaxed)
    }

    pub(crate) fn clear_warned(&self) {
        self.warned.store(false, Ordering::Relaxed);
    }

    pub(crate) fn is_warned(&self) -> bool {
        self.warned.load(Ordering::Relaxed)
    }

    /// GC verbosity as an integer, so interpreted code can read and
    /// write it through the `mem_verbosity` cvar.
    pub fn verbosity(&self) -> i64 {
        self.verbosity.load(Ordering::Relaxed)
    }

    pub fn set_verbosity(&self, level: i64) {
        self.verbosity.store(level, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity() > 0
    }

    /// Point-in-time copy of all gauges.
    pub fn snapshot(&self) -> MemStatsSnapshot {
        MemStatsSnapshot {
            soft_limit: self.soft_limit,
            hard_limit: self.hard_limit,
            bytes_allocated: self.bytes_allocated(),
            list_entries: self.list_entries(),
            n_allocs: self.n_allocs(),
            n_frees: self.n_frees(),
            peak_bytes: self.peak_bytes(),
        }
    }
}

/// Serializable snapshot of the memory gauges.
#[derive(Debug, Clone, Serialize)]
pub struct MemStatsSnapshot {
    pub soft_limit: usize,
    pub hard_limit: usize,
    pub bytes_allocated: usize,
    pub list_entries: usize,
    pub n_allocs: usize,
    pub n_frees: usize,
    pub peak_bytes: usize,
}

impl MemStatsSnapshot {
    /// JSON rendering for diagnostic consumers.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
