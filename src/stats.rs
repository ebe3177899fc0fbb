//! Allocation statistics and leak detection.

use std::fmt;

/// Point-in-time snapshot of pool usage, returned by
/// [`crate::FixedPoolAllocator::statistics`].
///
/// All fields are updated under the allocator's lock alongside the mutation
/// that caused the change, so a snapshot is always internally consistent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolStats {
    /// Sum of all requested (post-alignment) sizes ever successfully
    /// allocated. Never decreases.
    pub total_allocated: usize,

    /// Sum of requested sizes currently live.
    pub current_used: usize,

    /// Highest value `current_used` has ever reached.
    pub peak_used: usize,

    /// Count of successful `allocate` calls.
    pub total_allocations: u64,

    /// Count of successful `free` calls.
    pub total_frees: u64,

    /// `1.0 - largest_free_block / total_free_bytes`, or `0.0` if there is no
    /// free space. Computed on demand by a single free-list walk at snapshot
    /// time, not maintained incrementally.
    pub fragmentation: f64,
}

impl PoolStats {
    /// Record a successful allocation of `size` bytes.
    pub(crate) fn record_allocate(&mut self, size: usize) {
        self.total_allocated += size;
        self.current_used += size;
        self.total_allocations += 1;
        if self.current_used > self.peak_used {
            self.peak_used = self.current_used;
        }
    }

    /// Record a successful free of a block whose recorded size was `size`.
    pub(crate) fn record_free(&mut self, size: usize) {
        self.current_used = self.current_used.saturating_sub(size);
        self.total_frees += 1;
    }

    /// A leak is any mismatch between allocation/free counts, or any
    /// residual `current_used` -- the two are logically equivalent under the
    /// pool's invariants but both are checked defensively.
    pub fn has_leaks(&self) -> bool {
        self.total_allocations != self.total_frees || self.current_used != 0
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolStats {{ allocated: {}, used: {} (peak {}), allocations: {}, frees: {}, fragmentation: {:.2} }}",
            self.total_allocated,
            self.current_used,
            self.peak_used,
            self.total_allocations,
            self.total_frees,
            self.fragmentation,
        )
    }
}
