//! Thread-safe fixed-pool allocator.
//!
//! [`FixedPoolAllocator`] subdivides a single contiguous region obtained from
//! the host allocator into variable-sized blocks using an in-band free list:
//! each block carries a [`header::BlockHeader`] immediately before its
//! payload, allocation uses first-fit search with splitting, and freeing
//! coalesces with adjacent free neighbors. A single mutex serializes all
//! mutating access, so the allocator is safe to share across threads without
//! external synchronization.
//!
//! This is a library value, not a process-wide allocator: it does not
//! implement [`std::alloc::GlobalAlloc`] and does not replace the system
//! allocator. Construct one, call [`FixedPoolAllocator::init`], and use it
//! like any other allocator handle.

mod config;
mod error;
mod header;
mod pool;
mod stats;

pub use config::PoolConfig;
pub use error::{MmError, MmResult};
pub use header::{BlockHeader, HEADER_SIZE, MAGIC};
pub use pool::FixedPoolAllocator;
pub use stats::PoolStats;
