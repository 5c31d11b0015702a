//! Backing-memory strategy for pool blocks.
//!
//! Every block a pool chains together comes from a [`BlockSource`]. The
//! default [`SystemSource`] maps straight onto the global allocator; the
//! trait exists so the "release block memory" step can be swapped for a
//! managed backend (e.g. one where release is a no-op and a collector
//! reclaims blocks) without touching the allocation and growth logic.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Supplier of raw memory blocks for pools.
///
/// Implementations are stateless: a source is selected by type parameter on
/// the pool and never instantiated. Blocks handed out by [`acquire`] must be
/// zero-initialized; the pools rely on that to guarantee zeroed allocations.
///
/// [`acquire`]: BlockSource::acquire
pub trait BlockSource {
    /// Acquires a zeroed block of memory described by `layout`.
    fn acquire(layout: Layout) -> Result<NonNull<u8>>;

    /// Returns a block previously obtained from [`acquire`](Self::acquire).
    ///
    /// # Safety
    ///
    /// `ptr` must have come from `Self::acquire` with the same `layout`, and
    /// must not be used afterwards.
    unsafe fn release(ptr: NonNull<u8>, layout: Layout);
}

/// The default block source: `std::alloc`.
pub struct SystemSource;

impl BlockSource for SystemSource {
    fn acquire(layout: Layout) -> Result<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(Error::InvalidBlockSize { size: 0 });
        }

        // SAFETY: layout has a non-zero size (checked above).
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(raw).ok_or(Error::OutOfMemory)
    }

    unsafe fn release(ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr/layout match a prior acquire.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_returns_zeroed_memory() {
        let layout = Layout::from_size_align(256, 16).unwrap();
        let block = SystemSource::acquire(layout).unwrap();

        unsafe {
            let bytes = std::slice::from_raw_parts(block.as_ptr(), 256);
            assert!(bytes.iter().all(|&b| b == 0));

            SystemSource::release(block, layout);
        }
    }

    #[test]
    fn test_acquire_respects_alignment() {
        let layout = Layout::from_size_align(64, 16).unwrap();
        let block = SystemSource::acquire(layout).unwrap();

        assert_eq!(block.as_ptr().addr() % 16, 0);

        unsafe { SystemSource::release(block, layout) };
    }

    #[test]
    fn test_zero_sized_acquire_is_rejected() {
        let layout = Layout::from_size_align(0, 16).unwrap();
        assert_eq!(
            SystemSource::acquire(layout),
            Err(Error::InvalidBlockSize { size: 0 })
        );
    }
}
