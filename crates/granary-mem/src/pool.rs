//! The pool capability set.
//!
//! Higher-level code that needs scratch memory with bulk-lifetime semantics
//! (request-scoped strings, parser buffers) depends on the [`Pool`] trait,
//! not on any concrete pool's block-chain internals. The only implementation
//! in this crate is [`PoolRef`](crate::PoolRef) over
//! [`AllocOnlyPool`](crate::AllocOnlyPool); alternative strategies plug in
//! behind the same trait.

use std::ptr::NonNull;

/// Outcome of [`Pool::free`].
///
/// Freeing anything but the most recent allocation is not an error in an
/// alloc-only pool, it is an accepted leak. The tagged outcome lets callers
/// and tests tell "reclaimed" from "nothing happened" without an error path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeOutcome {
    /// The bytes were the most recent allocation and have been reclaimed.
    Reclaimed,
    /// The bytes stay reserved until `clear` or destruction.
    Retained,
}

/// Memory-usage snapshot of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of blocks in the chain.
    pub block_count: usize,
    /// Sum of all block capacities in bytes (headers excluded).
    pub total_capacity: usize,
    /// Bytes not yet handed out, summed over all blocks.
    pub total_left: usize,
    /// Bytes of the oldest block reserved for the pool's own bookkeeping.
    pub base_size: usize,
}

/// In-process allocator capability set.
///
/// Pools are single-threaded and hand out raw, zero-initialized memory whose
/// lifetime is bulk-managed: individual allocations are never reclaimed
/// except for the most recent one, and everything goes away together on
/// [`clear`](Pool::clear) or when the last reference is released.
///
/// Failure policy: a zero or absurdly large size, or the system failing to
/// supply a new block, is fatal (panics). There is no recoverable error.
pub trait Pool {
    /// Diagnostic name given at creation.
    fn name(&self) -> &str;

    /// Increments the reference count.
    ///
    /// The count is deliberately non-atomic; sharing a pool means cooperative
    /// single-threaded ownership, not concurrent access.
    fn acquire(&self);

    /// Decrements the reference count, destroying the pool at zero.
    ///
    /// # Safety
    ///
    /// After the release that drops the count to zero, every handle to this
    /// pool and every pointer allocated from it is dangling; using any of
    /// them is undefined behavior.
    unsafe fn release(&self);

    /// Allocates `size` bytes, aligned to the pool alignment and zeroed.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or larger than the maximum allocation size,
    /// or if a needed new block cannot be acquired.
    fn alloc(&self, size: usize) -> NonNull<u8>;

    /// Reclaims `mem` if and only if it is the most recent allocation.
    ///
    /// Anything else is a silent no-op reported as
    /// [`FreeOutcome::Retained`].
    ///
    /// # Safety
    ///
    /// `mem` must have been returned by this pool and not yet reclaimed by
    /// `free`, `clear`, or destruction.
    unsafe fn free(&self, mem: NonNull<u8>) -> FreeOutcome;

    /// Resizes an allocation.
    ///
    /// `None` behaves as [`alloc`](Pool::alloc); shrinking returns `mem`
    /// unchanged; growing extends in place when `mem` is the most recent
    /// allocation and its block has room, and otherwise allocates fresh
    /// memory and copies `old_size` bytes (the old region becomes a
    /// permanent leak until `clear`).
    ///
    /// # Safety
    ///
    /// A `Some(mem)` argument must have been returned by this pool, be valid
    /// for `old_size` bytes, and not yet reclaimed.
    ///
    /// # Panics
    ///
    /// Same fatal conditions as [`alloc`](Pool::alloc).
    unsafe fn realloc(
        &self,
        mem: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> NonNull<u8>;

    /// Resets the pool to its just-created state.
    ///
    /// All blocks but the oldest are released, the used part of the oldest
    /// block is zeroed, and the pool handle remains fully usable. Previously
    /// returned pointers become dangling.
    fn clear(&self);

    /// Largest allocation guaranteed not to grow the block chain.
    fn max_easy_alloc_size(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AllocOnlyPool;

    #[test]
    fn test_free_outcome_is_comparable() {
        assert_eq!(FreeOutcome::Reclaimed, FreeOutcome::Reclaimed);
        assert_ne!(FreeOutcome::Reclaimed, FreeOutcome::Retained);
    }

    #[test]
    fn test_capability_set_is_object_safe() {
        let pool = AllocOnlyPool::new("dyn", 512);
        let as_dyn: &dyn Pool = &pool;

        assert_eq!(as_dyn.name(), "dyn");
        let mem = as_dyn.alloc(32);
        assert_eq!(unsafe { as_dyn.free(mem) }, FreeOutcome::Reclaimed);

        unsafe { as_dyn.release() };
    }
}
