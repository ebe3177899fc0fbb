//! Construction-time configuration for [`crate::FixedPoolAllocator`].

/// Tunable parameters for a [`crate::FixedPoolAllocator`].
///
/// The magic sentinel stored in each header is not configurable here: it is
/// a format tag, not a policy knob, and stays fixed across all instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Bytes requested from the host allocator when the pool is initialized.
    pub initial_size: usize,

    /// Lower bound on any block's payload size. Splits never produce a
    /// residue smaller than this.
    pub min_payload: usize,

    /// All requested sizes are rounded up to a multiple of this. Must be a
    /// power of two.
    pub alignment: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { initial_size: 1024 * 1024, min_payload: 16, alignment: 8 }
    }
}

impl PoolConfig {
    /// Create a configuration for a pool of the given size, keeping the
    /// default minimum payload and alignment.
    pub fn with_initial_size(initial_size: usize) -> Self {
        Self { initial_size, ..Default::default() }
    }

    /// Override the minimum payload size.
    pub fn with_min_payload(mut self, min_payload: usize) -> Self {
        self.min_payload = min_payload;
        self
    }

    /// Override the alignment quantum. Must be a power of two.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        self.alignment = alignment;
        self
    }
}
