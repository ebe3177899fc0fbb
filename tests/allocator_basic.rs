//! Integration tests for the core allocate/split/coalesce scenarios.

use fixedpool_alloc::{FixedPoolAllocator, PoolConfig};

fn small_pool() -> FixedPoolAllocator {
    let allocator = FixedPoolAllocator::with_config(PoolConfig::with_initial_size(4096));
    allocator.init().expect("init should succeed");
    allocator
}

#[test]
fn split_then_fill() {
    let allocator = small_pool();

    let a = allocator.allocate(128).unwrap();
    let b = allocator.allocate(256).unwrap();
    let c = allocator.allocate(512).unwrap();

    assert!(a.as_ptr() < b.as_ptr());
    assert!(b.as_ptr() < c.as_ptr());

    let stats = allocator.statistics();
    assert_eq!(stats.current_used, 128 + 256 + 512);
    assert_eq!(stats.total_allocations, 3);
}

#[test]
fn hole_reuse() {
    let allocator = small_pool();

    let _a = allocator.allocate(128).unwrap();
    let b = allocator.allocate(256).unwrap();
    let _c = allocator.allocate(512).unwrap();

    allocator.free(b.as_ptr()).unwrap();
    let reused = allocator.allocate(128).unwrap();

    assert_eq!(reused, b, "the hole left by freeing b should be reused");
}

#[test]
fn three_way_coalesce() {
    let allocator = small_pool();

    let a = allocator.allocate(64).unwrap();
    let b = allocator.allocate(64).unwrap();
    let c = allocator.allocate(64).unwrap();

    allocator.free(a.as_ptr()).unwrap();
    allocator.free(c.as_ptr()).unwrap();
    allocator.free(b.as_ptr()).unwrap();

    let stats = allocator.statistics();
    assert_eq!(stats.current_used, 0);
    assert!(!allocator.has_leaks());

    // The merged hole should be big enough to satisfy a request spanning
    // all three former blocks' payloads.
    let big = allocator.allocate(64 * 3).unwrap();
    assert_eq!(big, a);
}

#[test]
fn exhaustion_then_full_release() {
    let allocator = small_pool();
    let mut ptrs = Vec::new();

    while let Some(ptr) = allocator.allocate(64) {
        ptrs.push(ptr);
    }
    assert!(!ptrs.is_empty());

    for ptr in ptrs {
        allocator.free(ptr.as_ptr()).unwrap();
    }

    let stats = allocator.statistics();
    assert_eq!(stats.current_used, 0);
    assert!(!allocator.has_leaks());
}

#[test]
fn invalid_free_is_rejected() {
    let allocator = small_pool();

    let ptr = allocator.allocate(64).unwrap();
    allocator.free(ptr.as_ptr()).unwrap();

    // Double free.
    assert!(allocator.free(ptr.as_ptr()).is_err());

    let stats_after_double_free = allocator.statistics();
    assert_eq!(stats_after_double_free.total_frees, 1);

    // Free of a pointer one byte into a payload.
    let live = allocator.allocate(64).unwrap();
    let mid = unsafe { live.as_ptr().add(1) };
    assert!(allocator.free(mid).is_err());

    assert!(allocator.free(std::ptr::null_mut()).is_err());
}

#[test]
fn init_is_idempotent() {
    let allocator = small_pool();
    assert!(allocator.init().is_ok());
    let ptr = allocator.allocate(32).unwrap();
    assert!(allocator.init().is_ok());
    allocator.free(ptr.as_ptr()).unwrap();
}

#[test]
fn teardown_then_reinit() {
    let allocator = small_pool();
    let _ = allocator.allocate(64).unwrap();
    allocator.teardown();

    assert_eq!(allocator.statistics(), Default::default());

    allocator.init().unwrap();
    let ptr = allocator.allocate(64).unwrap();
    allocator.free(ptr.as_ptr()).unwrap();
}
