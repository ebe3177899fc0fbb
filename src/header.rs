//! In-band block header layout and integrity checks.

use std::ptr::NonNull;

/// Fixed sentinel stored in every header; used to recognize a valid header
/// and reject pointers that don't reference one.
pub const MAGIC: u32 = 0xDEAD_BEEF;

/// Per-block metadata, stored immediately before the block's payload bytes.
///
/// `next`/`prev` are non-owning references to neighboring headers within the
/// same arena. The arena owns every header uniformly; these pointers exist
/// only to thread the free list and are only ever dereferenced while the
/// allocator's lock is held.
#[repr(C)]
pub struct BlockHeader {
    pub size: usize,
    pub is_free: bool,
    pub next: Option<NonNull<BlockHeader>>,
    pub prev: Option<NonNull<BlockHeader>>,
    pub magic: u32,
    pub checksum: u32,
}

impl BlockHeader {
    /// Compute the checksum for a header living at `addr` with the given
    /// `size`/`is_free`. Including the address means a header copied bodily
    /// to a different location fails validation.
    pub fn compute_checksum(addr: usize, size: usize, is_free: bool) -> u32 {
        let addr_part = (addr as u32) ^ ((addr >> 32) as u32);
        let size_part = (size as u32) ^ ((size >> 32) as u32);
        let free_part = if is_free { 0xFFFF_FFFF } else { 0x0000_0000 };
        addr_part ^ size_part ^ free_part
    }

    /// Recompute and store the checksum for this header, given its own
    /// address. Must be called after any write to `size` or `is_free`.
    pub fn refresh_checksum(&mut self, self_addr: usize) {
        self.checksum = Self::compute_checksum(self_addr, self.size, self.is_free);
    }

    /// Validate that a candidate header pointer is non-null, carries the
    /// magic sentinel, and has a checksum consistent with its own address.
    ///
    /// # Safety
    /// `ptr` must point at memory that is at least `size_of::<BlockHeader>()`
    /// bytes and valid to read (though not necessarily a real header --
    /// validation is exactly how callers find out).
    pub unsafe fn validate(ptr: NonNull<BlockHeader>) -> bool {
        let header = ptr.as_ref();
        if header.magic != MAGIC {
            return false;
        }
        let expected = Self::compute_checksum(ptr.as_ptr() as usize, header.size, header.is_free);
        header.checksum == expected
    }
}

/// Size in bytes of a block header, i.e. the offset from a header's address
/// to its payload's address.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_depends_on_address() {
        let a = BlockHeader::compute_checksum(0x1000, 64, false);
        let b = BlockHeader::compute_checksum(0x2000, 64, false);
        assert_ne!(a, b);
    }

    #[test]
    fn checksum_depends_on_free_flag() {
        let a = BlockHeader::compute_checksum(0x1000, 64, false);
        let b = BlockHeader::compute_checksum(0x1000, 64, true);
        assert_ne!(a, b);
    }

    #[test]
    fn refresh_then_validate_round_trips() {
        let mut header = BlockHeader {
            size: 128,
            is_free: true,
            next: None,
            prev: None,
            magic: MAGIC,
            checksum: 0,
        };
        let addr = &header as *const BlockHeader as usize;
        header.refresh_checksum(addr);
        let ptr = NonNull::from(&header);
        assert!(unsafe { BlockHeader::validate(ptr) });
    }

    #[test]
    fn wrong_magic_fails_validation() {
        let mut header =
            BlockHeader { size: 128, is_free: true, next: None, prev: None, magic: 0, checksum: 0 };
        let addr = &header as *const BlockHeader as usize;
        header.refresh_checksum(addr);
        let ptr = NonNull::from(&header);
        assert!(!unsafe { BlockHeader::validate(ptr) });
    }

    #[test]
    fn tampered_size_fails_validation() {
        let mut header = BlockHeader {
            size: 128,
            is_free: true,
            next: None,
            prev: None,
            magic: MAGIC,
            checksum: 0,
        };
        let addr = &header as *const BlockHeader as usize;
        header.refresh_checksum(addr);
        header.size = 256;
        let ptr = NonNull::from(&header);
        assert!(!unsafe { BlockHeader::validate(ptr) });
    }
}
