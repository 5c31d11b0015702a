//! End-to-end pool behavior: allocation layout, last-allocation reclaim,
//! growth, realloc semantics, and clear/reuse cycles.

use granary_mem::{AllocOnlyPool, FreeOutcome, Pool, POOL_ALIGNMENT};

#[test]
fn test_reclaimed_region_is_reused() {
    let pool = AllocOnlyPool::new("reuse", 64);

    let p1 = pool.alloc(10);
    let p2 = pool.alloc(16);
    assert_eq!(p2.as_ptr().addr(), p1.as_ptr().addr() + 16);

    let left_before = pool.max_easy_alloc_size();
    assert_eq!(unsafe { pool.free(p2) }, FreeOutcome::Reclaimed);
    assert_eq!(pool.max_easy_alloc_size(), left_before + 16);

    // The next allocation lands exactly where p2 was.
    let p3 = pool.alloc(8);
    assert_eq!(p3, p2);

    unsafe { pool.release() };
}

#[test]
fn test_non_last_free_leaks_by_design() {
    let pool = AllocOnlyPool::new("noop", 256);

    let p1 = pool.alloc(20);
    unsafe { p1.as_ptr().write_bytes(0x77, 20) };
    let _p2 = pool.alloc(20);

    assert_eq!(unsafe { pool.free(p1) }, FreeOutcome::Retained);

    // p1's bytes remain reserved and untouched.
    let p3 = pool.alloc(5);
    assert_ne!(p3, p1);
    let bytes = unsafe { std::slice::from_raw_parts(p1.as_ptr(), 20) };
    assert!(bytes.iter().all(|&b| b == 0x77));

    unsafe { pool.release() };
}

#[test]
fn test_overflow_allocation_grows_chain() {
    let pool = AllocOnlyPool::new("overflow", 32);

    let first_capacity = pool.stats().total_capacity;

    // Larger than anything left in the first block.
    let big = pool.alloc(first_capacity + 8);
    assert_eq!(big.as_ptr().addr() % POOL_ALIGNMENT, 0);

    let stats = pool.stats();
    assert_eq!(stats.block_count, 2);

    let new_capacity = stats.total_capacity - first_capacity;
    assert!(new_capacity >= 2 * first_capacity);
    assert!(new_capacity >= first_capacity + 8);

    unsafe { pool.release() };
}

#[test]
fn test_realloc_in_place_then_forced_copy() {
    let pool = AllocOnlyPool::new("reallocs", 1024);

    // Plenty of room: the last allocation grows in place.
    let p1 = pool.alloc(10);
    unsafe { p1.as_ptr().write_bytes(0x42, 10) };

    let grown = unsafe { pool.realloc(Some(p1), 10, 50) };
    assert_eq!(grown, p1);

    // Pin another allocation after it: now p1 cannot grow in place.
    let _pin = pool.alloc(16);
    let moved = unsafe { pool.realloc(Some(p1), 10, 120) };
    assert_ne!(moved, p1);

    let bytes = unsafe { std::slice::from_raw_parts(moved.as_ptr(), 10) };
    assert!(bytes.iter().all(|&b| b == 0x42));

    unsafe { pool.release() };
}

#[test]
fn test_realloc_copy_when_block_is_nearly_full() {
    let pool = AllocOnlyPool::new("tight", 64);

    let p1 = pool.alloc(16);
    unsafe { p1.as_ptr().write_bytes(0x24, 16) };

    // Ask for more than the whole remaining block.
    let want = pool.max_easy_alloc_size() + 64;
    let moved = unsafe { pool.realloc(Some(p1), 16, want) };
    assert_ne!(moved, p1);
    assert_eq!(pool.stats().block_count, 2);

    let bytes = unsafe { std::slice::from_raw_parts(moved.as_ptr(), 16) };
    assert!(bytes.iter().all(|&b| b == 0x24));

    unsafe { pool.release() };
}

#[test]
fn test_clear_after_exact_fill_restores_first_address() {
    let pool = AllocOnlyPool::new("refill", 64);

    let first_ever = pool.alloc(16);
    let left_after_create = pool.max_easy_alloc_size() + 16;

    // Drain the block down to exactly zero free bytes.
    let remaining = pool.max_easy_alloc_size();
    assert!(remaining > 0);
    let _fill = pool.alloc(remaining);
    assert_eq!(pool.max_easy_alloc_size(), 0);

    pool.clear();
    assert_eq!(pool.max_easy_alloc_size(), left_after_create);

    let reborn = pool.alloc(16);
    assert_eq!(reborn, first_ever);

    unsafe { pool.release() };
}

#[test]
fn test_pool_is_reusable_across_many_clear_cycles() {
    let pool = AllocOnlyPool::new("cycles", 256);

    let baseline = pool.max_easy_alloc_size();
    for round in 0..50 {
        for _ in 0..=round % 7 {
            let mem = pool.alloc(64);
            unsafe { mem.as_ptr().write_bytes(0xee, 64) };
        }
        pool.clear();
        assert_eq!(pool.max_easy_alloc_size(), baseline);
        assert_eq!(pool.stats().block_count, 1);
    }

    unsafe { pool.release() };
}

#[test]
fn test_shared_pool_survives_partial_release() {
    let pool = AllocOnlyPool::new("shared", 512);
    let collaborator = pool;
    collaborator.acquire();

    let mem = pool.alloc(32);
    unsafe { mem.as_ptr().write_bytes(0x33, 32) };

    // One owner bows out; the memory stays valid for the other.
    unsafe { pool.release() };
    let bytes = unsafe { std::slice::from_raw_parts(mem.as_ptr(), 32) };
    assert!(bytes.iter().all(|&b| b == 0x33));

    unsafe { collaborator.release() };
}

#[test]
fn test_create_survives_minimal_size_hints() {
    // Every hint, however tight, must yield a single-block pool whose
    // bookkeeping survives a clear/alloc/release cycle.
    for name in ["", "r", "minimal-hint"] {
        for hint in 0..=256usize {
            let pool = AllocOnlyPool::new(name, hint);
            assert_eq!(
                pool.stats().block_count,
                1,
                "name {name:?} hint {hint}"
            );

            pool.clear();
            assert_eq!(pool.refcount(), 1, "name {name:?} hint {hint}");
            assert_eq!(pool.name(), name, "name {name:?} hint {hint}");

            let mem = pool.alloc(16);
            unsafe { mem.as_ptr().write_bytes(0x5c, 16) };
            unsafe { pool.release() };
        }
    }
}

#[test]
fn test_max_easy_alloc_never_grows_the_chain() {
    let pool = AllocOnlyPool::new("easy", 64);

    let easy = pool.max_easy_alloc_size();
    assert!(easy > 0);
    let _mem = pool.alloc(easy);
    assert_eq!(pool.stats().block_count, 1);

    unsafe { pool.release() };
}
