//! Error types returned by allocator operations.

/// Failure modes exposed by [`crate::FixedPoolAllocator`].
///
/// Resource exhaustion ("no fit" on allocate) is not modeled as an error: it
/// is surfaced as `allocate` returning `None`, matching the original design's
/// distinction between caller mistakes (this enum) and ordinary exhaustion.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// The backing region could not be obtained from the host allocator.
    #[error("failed to initialize pool: could not acquire backing region")]
    InitFailed,

    /// A pointer passed to `free` is null, unaligned, not initialized, or
    /// its recovered header fails integrity validation.
    #[error("invalid pointer passed to free")]
    InvalidPointer,
}

/// Convenience alias for allocator operations that can fail with [`MmError`].
pub type MmResult<T = ()> = Result<T, MmError>;
