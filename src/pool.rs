//! Free-list engine: arena acquisition, first-fit search, splitting and
//! coalescing, and the public [`FixedPoolAllocator`] handle.

use std::alloc::{self, Layout};
use std::ptr::NonNull;
use std::sync::Mutex;

use crate::config::PoolConfig;
use crate::error::{MmError, MmResult};
use crate::header::{BlockHeader, HEADER_SIZE, MAGIC};
use crate::stats::PoolStats;

/// The raw backing region obtained from the host allocator at init time.
struct Arena {
    base: NonNull<u8>,
    layout: Layout,
}

struct PoolInner {
    arena: Option<Arena>,
    first_block: Option<NonNull<BlockHeader>>,
    stats: PoolStats,
}

impl PoolInner {
    fn new() -> Self {
        Self { arena: None, first_block: None, stats: PoolStats::default() }
    }
}

/// A thread-safe, fixed-capacity general-purpose allocator.
///
/// A single [`std::sync::Mutex`] guards the arena, the free list, and the
/// statistics counters together, so every operation observes and leaves a
/// consistent state. See the crate docs for the block layout and the
/// splitting/coalescing policy.
pub struct FixedPoolAllocator {
    config: PoolConfig,
    inner: Mutex<PoolInner>,
}

// `PoolInner` only ever exposes its raw pointers to code that first acquires
// `inner`'s lock, so the allocator as a whole is safe to share and send
// across threads despite containing raw pointers internally.
unsafe impl Send for FixedPoolAllocator {}
unsafe impl Sync for FixedPoolAllocator {}

impl Default for FixedPoolAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedPoolAllocator {
    /// Construct an allocator with default configuration. No arena memory is
    /// owned until [`init`](Self::init) is called.
    pub fn new() -> Self {
        Self::with_config(PoolConfig::default())
    }

    /// Construct an allocator with the given configuration.
    pub fn with_config(config: PoolConfig) -> Self {
        Self { config, inner: Mutex::new(PoolInner::new()) }
    }

    /// Acquire the backing region and lay down the single spanning free
    /// block. Idempotent: returns `Ok(())` without effect if already
    /// initialized.
    pub fn init(&self) -> MmResult {
        let mut inner = self.inner.lock().unwrap();
        if inner.arena.is_some() {
            return Ok(());
        }

        let layout = Layout::from_size_align(self.config.initial_size, self.config.alignment)
            .map_err(|_| MmError::InitFailed)?;
        // SAFETY: `layout` has non-zero size, checked by `Layout::from_size_align`
        // succeeding only for sizes that fit the allocator's requirements; a
        // zero-sized arena would never hold a valid block and is rejected below.
        let base = unsafe { alloc::alloc(layout) };
        let base = match NonNull::new(base) {
            Some(base) => base,
            None => {
                #[cfg(feature = "logging")]
                tracing::warn!(size = self.config.initial_size, "failed to acquire backing region");
                return Err(MmError::InitFailed);
            }
        };

        let header_ptr = base.cast::<BlockHeader>();
        let payload_size = self.config.initial_size.saturating_sub(HEADER_SIZE);
        // SAFETY: `base` was just allocated with `layout.size() >= HEADER_SIZE`
        // (enforced by the config's default/builder, which never produces an
        // initial_size smaller than a single header), so writing one header at
        // the start of the region is in-bounds.
        unsafe {
            header_ptr.as_ptr().write(BlockHeader {
                size: payload_size,
                is_free: true,
                next: None,
                prev: None,
                magic: MAGIC,
                checksum: 0,
            });
            (*header_ptr.as_ptr()).refresh_checksum(header_ptr.as_ptr() as usize);
        }

        inner.first_block = Some(header_ptr);
        inner.stats = PoolStats::default();
        // Published last, under the lock: a concurrent caller sees either no
        // arena or a fully constructed one.
        inner.arena = Some(Arena { base, layout });

        #[cfg(feature = "logging")]
        tracing::info!(size = self.config.initial_size, "pool initialized");
        Ok(())
    }

    /// Allocate `size` bytes. Returns `None` if the pool is not initialized,
    /// `size` is zero, no free block large enough exists, or a corrupted
    /// header is encountered while searching.
    pub fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.arena.as_ref()?;

        let aligned = align_up(size, self.config.alignment).max(self.config.min_payload);
        let chosen = find_first_fit(inner.first_block, aligned)?;

        // SAFETY: `chosen` was returned by `find_first_fit`, which only
        // yields headers that passed `BlockHeader::validate` while walking
        // the list rooted at `inner.first_block`.
        unsafe {
            maybe_split(chosen, aligned, self.config.min_payload);
            let header = chosen.as_ptr();
            (*header).is_free = false;
            (*header).refresh_checksum(header as usize);
        }

        inner.stats.record_allocate(aligned);
        #[cfg(feature = "logging")]
        tracing::debug!(requested = size, aligned, "allocated block");

        // SAFETY: the payload immediately follows the header within the
        // same allocation.
        Some(unsafe { payload_from_header(chosen) })
    }

    /// Return a previously allocated block to the pool, coalescing with any
    /// free neighbors.
    ///
    /// # Errors
    /// Returns [`MmError::InvalidPointer`] if `ptr` is null, the pool is not
    /// initialized, or the recovered header fails integrity validation (for
    /// example on a double free or a pointer that doesn't point at a
    /// previously returned payload).
    pub fn free(&self, ptr: *mut u8) -> MmResult {
        let ptr = NonNull::new(ptr).ok_or(MmError::InvalidPointer)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.arena.is_none() {
            return Err(MmError::InvalidPointer);
        }

        // SAFETY: recovering the header from a payload address is only valid
        // if `ptr` really was returned by a prior `allocate` on this pool;
        // `BlockHeader::validate` below is exactly the check that catches
        // the case where it wasn't.
        let header = unsafe { header_from_payload(ptr) };
        if !unsafe { BlockHeader::validate(header) } {
            #[cfg(feature = "logging")]
            tracing::warn!(addr = ?header.as_ptr(), "rejected free: header failed validation");
            return Err(MmError::InvalidPointer);
        }
        if unsafe { header.as_ref().is_free } {
            #[cfg(feature = "logging")]
            tracing::warn!(addr = ?header.as_ptr(), "rejected free: block already free");
            return Err(MmError::InvalidPointer);
        }

        let freed_size = unsafe { header.as_ref().size };

        // SAFETY: `header` just passed validation above.
        unsafe {
            (*header.as_ptr()).is_free = true;

            let merged = coalesce_forward(header).unwrap_or(header);
            let merged = coalesce_backward(merged, &mut inner.first_block).unwrap_or(merged);

            let merged_ptr = merged.as_ptr();
            (*merged_ptr).refresh_checksum(merged_ptr as usize);
        }

        inner.stats.record_free(freed_size);
        #[cfg(feature = "logging")]
        tracing::debug!(size = freed_size, "freed block");
        Ok(())
    }

    /// Release the backing region and reset statistics. No-op if not
    /// initialized.
    ///
    /// The caller must ensure no other `allocate`/`free` call is in flight;
    /// teardown does not drain or fence outstanding callers.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(arena) = inner.arena.take() {
            // SAFETY: `arena.base`/`arena.layout` are exactly the pointer and
            // layout returned by the matching `alloc::alloc` call in `init`,
            // and no other reference to the region survives `inner.arena.take()`.
            unsafe { alloc::dealloc(arena.base.as_ptr(), arena.layout) };
        }
        inner.first_block = None;
        inner.stats = PoolStats::default();
        #[cfg(feature = "logging")]
        tracing::info!("pool torn down");
    }

    /// Snapshot of current usage counters, including an on-demand
    /// fragmentation estimate.
    pub fn statistics(&self) -> PoolStats {
        let inner = self.inner.lock().unwrap();
        let mut stats = inner.stats;
        stats.fragmentation = compute_fragmentation(inner.first_block);
        stats
    }

    /// Whether the pool's allocation/free counters or live-usage total
    /// indicate a leak. See [`PoolStats::has_leaks`].
    pub fn has_leaks(&self) -> bool {
        self.inner.lock().unwrap().stats.has_leaks()
    }
}

fn align_up(size: usize, alignment: usize) -> usize {
    (size + alignment - 1) & !(alignment - 1)
}

/// Walk the free list from `first`, returning the first free block whose
/// size is at least `size`. Stops (returning `None`) the moment a header
/// fails validation, without mutating anything.
fn find_first_fit(first: Option<NonNull<BlockHeader>>, size: usize) -> Option<NonNull<BlockHeader>> {
    let mut current = first;
    while let Some(block) = current {
        // SAFETY: every pointer in the chain starting at `first_block` is
        // either the initial header written by `init` or a header written
        // by `maybe_split`/coalescing, all reached only under the lock.
        if !unsafe { BlockHeader::validate(block) } {
            return None;
        }
        let header = unsafe { block.as_ref() };
        if header.is_free && header.size >= size {
            return Some(block);
        }
        current = header.next;
    }
    None
}

/// If the chosen block has enough residue beyond `size` to carve out another
/// valid block, split it in place.
///
/// # Safety
/// `chosen` must be a validated header reachable from the pool's free list.
unsafe fn maybe_split(chosen: NonNull<BlockHeader>, size: usize, min_payload: usize) {
    let chosen_ptr = chosen.as_ptr();
    let total = (*chosen_ptr).size;
    if total < size + HEADER_SIZE + min_payload {
        return;
    }

    let new_addr = (chosen_ptr as usize) + HEADER_SIZE + size;
    let new_header = new_addr as *mut BlockHeader;
    let residue = total - size - HEADER_SIZE;
    let old_next = (*chosen_ptr).next;

    new_header.write(BlockHeader {
        size: residue,
        is_free: true,
        next: old_next,
        prev: Some(chosen),
        magic: MAGIC,
        checksum: 0,
    });
    (*new_header).refresh_checksum(new_header as usize);

    if let Some(mut next) = old_next {
        next.as_mut().prev = NonNull::new(new_header);
    }

    (*chosen_ptr).size = size;
    (*chosen_ptr).next = NonNull::new(new_header);
}

/// If `block`'s forward neighbor exists and is free, absorb it into `block`.
///
/// # Safety
/// `block` must be a validated header.
unsafe fn coalesce_forward(block: NonNull<BlockHeader>) -> Option<NonNull<BlockHeader>> {
    let block_ptr = block.as_ptr();
    let next = (*block_ptr).next?;
    if !BlockHeader::validate(next) || !next.as_ref().is_free {
        return None;
    }

    let next_ptr = next.as_ptr();
    (*block_ptr).size += HEADER_SIZE + (*next_ptr).size;
    (*block_ptr).next = (*next_ptr).next;
    if let Some(mut after) = (*next_ptr).next {
        after.as_mut().prev = Some(block);
    }
    Some(block)
}

/// If `block`'s backward neighbor exists and is free, absorb `block` into it,
/// updating `first_block` if `block` itself was the head.
///
/// # Safety
/// `block` must be a validated header.
unsafe fn coalesce_backward(
    block: NonNull<BlockHeader>,
    first_block: &mut Option<NonNull<BlockHeader>>,
) -> Option<NonNull<BlockHeader>> {
    let block_ptr = block.as_ptr();
    let prev = (*block_ptr).prev?;
    if !BlockHeader::validate(prev) || !prev.as_ref().is_free {
        return None;
    }

    let prev_ptr = prev.as_ptr();
    (*prev_ptr).size += HEADER_SIZE + (*block_ptr).size;
    (*prev_ptr).next = (*block_ptr).next;
    if let Some(mut after) = (*block_ptr).next {
        after.as_mut().prev = Some(prev);
    }
    if *first_block == Some(block) {
        *first_block = Some(prev);
    }
    Some(prev)
}

/// # Safety
/// `header` must point at a block header embedded in the pool's arena.
unsafe fn payload_from_header(header: NonNull<BlockHeader>) -> NonNull<u8> {
    let addr = (header.as_ptr() as usize) + HEADER_SIZE;
    NonNull::new_unchecked(addr as *mut u8)
}

/// # Safety
/// `payload` must be an address `HEADER_SIZE` or more bytes past a readable
/// region; validation of the recovered header is the caller's
/// responsibility.
unsafe fn header_from_payload(payload: NonNull<u8>) -> NonNull<BlockHeader> {
    let addr = (payload.as_ptr() as usize) - HEADER_SIZE;
    NonNull::new_unchecked(addr as *mut BlockHeader)
}

/// `1.0 - largest_free / total_free`, or `0.0` if nothing is free. A single
/// forward walk of the whole chain, done only when a snapshot is requested.
fn compute_fragmentation(first: Option<NonNull<BlockHeader>>) -> f64 {
    let mut total_free = 0usize;
    let mut largest_free = 0usize;
    let mut current = first;
    while let Some(block) = current {
        // SAFETY: same reasoning as `find_first_fit`.
        if !unsafe { BlockHeader::validate(block) } {
            break;
        }
        let header = unsafe { block.as_ref() };
        if header.is_free {
            total_free += header.size;
            largest_free = largest_free.max(header.size);
        }
        current = header.next;
    }
    if total_free == 0 {
        0.0
    } else {
        1.0 - (largest_free as f64 / total_free as f64)
    }
}
