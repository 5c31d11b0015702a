//! Alloc-only memory pool.
//!
//! [`AllocOnlyPool`] hands out memory from a singly-linked chain of growable
//! blocks, newest first. Allocation is a bump of the newest block's free
//! space; nothing is reclaimed individually except the single most recent
//! allocation, which can be freed or regrown in place in O(1). Everything
//! else lives until [`clear`](Pool::clear) or until the last reference is
//! released.
//!
//! The pool's own control structure is self-hosted: it is allocated from the
//! first block it creates, so destroying the final block also destroys the
//! pool's bookkeeping. Creation bootstraps through a transient value to break
//! that circularity.
//!
//! # Safety
//!
//! This module is unavoidably unsafe at the edges: the pool returns raw
//! pointers whose validity ends at `clear`/destruction, and the `Copy`
//! handle ([`PoolRef`]) does not track that lifetime. The contract is the
//! same as for any manually refcounted handle: do not touch the pool or its
//! memory after the release that drops the refcount to zero.

use std::alloc::Layout;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use granary_log::debug;

use crate::pool::{FreeOutcome, Pool, PoolStats};
use crate::source::{BlockSource, SystemSource};

/// Alignment of every address returned by a pool.
pub const POOL_ALIGNMENT: usize = 16;

/// Largest size accepted by `alloc`/`realloc`. Anything above this is a
/// caller bug and fails fatally.
pub const MAX_ALLOC_SIZE: usize = isize::MAX as usize;

/// Rounds `size` up to the pool alignment.
const fn align_up(size: usize) -> usize {
    (size + POOL_ALIGNMENT - 1) & !(POOL_ALIGNMENT - 1)
}

/// Header at the start of every block; payload bytes follow it contiguously.
#[repr(C)]
struct BlockHeader {
    /// Next-older block, null for the oldest.
    prev: *mut BlockHeader,
    /// Usable payload bytes (header excluded).
    size: usize,
    /// Payload bytes not yet handed out.
    left: usize,
    /// Size of the most recent allocation from this block, 0 if none
    /// outstanding.
    last_alloc_size: usize,
}

const BLOCK_HEADER_SIZE: usize = align_up(mem::size_of::<BlockHeader>());

/// First payload byte of `block`.
///
/// # Safety
///
/// `block` must point to a live block acquired by `grow_block`.
unsafe fn block_data(block: *mut BlockHeader) -> *mut u8 {
    unsafe { block.cast::<u8>().add(BLOCK_HEADER_SIZE) }
}

/// Poisons (in debug builds) and releases one block.
///
/// # Safety
///
/// `block` must be live and is dead after the call.
unsafe fn release_block<S: BlockSource>(block: *mut BlockHeader) {
    unsafe {
        let total = BLOCK_HEADER_SIZE + (*block).size;

        #[cfg(debug_assertions)]
        ptr::write_bytes(block.cast::<u8>(), 0xde, total);

        let layout = Layout::from_size_align_unchecked(total, POOL_ALIGNMENT);
        S::release(NonNull::new_unchecked(block.cast::<u8>()), layout);
    }
}

/// Smallest power of two >= `size`. Overflow is fatal.
fn nearest_power(size: usize) -> usize {
    size.checked_next_power_of_two()
        .expect("pool block size overflow")
}

/// The alloc-only pool control structure.
///
/// Values of this type live inside their own first block and are reached
/// through [`PoolRef`] handles; the type is `!Send` and `!Sync` by
/// construction (raw pointers, `Cell` refcount) and must be shared only
/// within one thread.
pub struct AllocOnlyPool<S: BlockSource = SystemSource> {
    refcount: Cell<u32>,
    /// Head of the block chain (newest block).
    block: Cell<*mut BlockHeader>,
    /// Bytes of the oldest block holding this structure and the name;
    /// never reclaimed by `clear`.
    base_size: usize,
    name_ptr: *const u8,
    name_len: usize,
    _source: PhantomData<S>,
}

/// Copyable shared-ownership handle to an [`AllocOnlyPool`].
///
/// Ownership is manual: [`Pool::acquire`] and [`Pool::release`] adjust a
/// non-atomic refcount, and the pool is destroyed when it reaches zero.
/// Copies of the handle are cheap and do not affect the count. Using any
/// copy after the final release is undefined behavior.
pub struct PoolRef<S: BlockSource = SystemSource> {
    pool: NonNull<AllocOnlyPool<S>>,
}

impl<S: BlockSource> Clone for PoolRef<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: BlockSource> Copy for PoolRef<S> {}

impl AllocOnlyPool {
    /// Creates a pool backed by the system allocator.
    ///
    /// `size_hint` is the requested first-block size in bytes. Hints smaller
    /// than the pool's own bookkeeping needs are rounded up to the next
    /// power of two that fits the control structure, one block header, and
    /// the name.
    ///
    /// # Panics
    ///
    /// Panics if the first block cannot be allocated.
    pub fn new(name: &str, size_hint: usize) -> PoolRef {
        Self::create(name, size_hint)
    }
}

impl<S: BlockSource> AllocOnlyPool<S> {
    /// Creates a pool on a specific [`BlockSource`].
    ///
    /// # Panics
    ///
    /// Panics if the first block cannot be allocated.
    pub fn create(name: &str, size_hint: usize) -> PoolRef<S> {
        // The name is bump-allocated, so its footprint is aligned too; an
        // unaligned count here would let a tight hint pass unrounded and
        // overflow the first block mid-bootstrap.
        let min_alloc = align_up(mem::size_of::<Self>())
            + BLOCK_HEADER_SIZE
            + align_up(name.len() + 1);

        let size = if size_hint < min_alloc {
            nearest_power(size_hint + min_alloc)
        } else {
            size_hint
        };

        // The first block allocation needs a pool, but the persistent pool
        // structure lives inside that block. Bootstrap through a transient
        // value and copy it into place once the block exists.
        let boot = AllocOnlyPool::<S> {
            refcount: Cell::new(1),
            block: Cell::new(ptr::null_mut()),
            base_size: 0,
            name_ptr: ptr::null(),
            name_len: 0,
            _source: PhantomData,
        };
        boot.grow_block(size);

        let pool = boot.alloc_impl(mem::size_of::<Self>()).cast::<Self>();

        // SAFETY: `pool` is a fresh, aligned, zeroed allocation of the right
        // size from the block `boot` just created; writing `boot` into it
        // transfers ownership of the chain. The raw-pointer field writes
        // below happen while no reference into the structure is live.
        unsafe {
            ptr::write(pool.as_ptr(), boot);

            let name_mem = (*pool.as_ptr()).alloc_str_impl(name);
            (*pool.as_ptr()).name_ptr = name_mem.as_ptr();
            (*pool.as_ptr()).name_len = name.len();

            // Everything consumed so far is the pool's own bookkeeping and
            // must survive `clear`. The bootstrap must not have grown a
            // second block: base_size only protects the oldest one.
            let block = (*pool.as_ptr()).block.get();
            debug_assert!((*block).prev.is_null());
            (*pool.as_ptr()).base_size = (*block).size - (*block).left;
            (*block).last_alloc_size = 0;
        }

        PoolRef { pool }
    }

    /// Diagnostic name given at creation.
    pub fn name(&self) -> &str {
        if self.name_ptr.is_null() {
            return "";
        }

        // SAFETY: name_ptr/name_len were copied verbatim from a &str into
        // the base prefix of the oldest block, which outlives &self.
        unsafe {
            let bytes = std::slice::from_raw_parts(self.name_ptr, self.name_len);
            std::str::from_utf8_unchecked(bytes)
        }
    }

    /// Chains a new newest block able to hold `size` bytes (header
    /// included).
    ///
    /// On a grown pool the new block is at least double the current one,
    /// rounded up to the next power of two.
    fn grow_block(&self, size: usize) {
        debug_assert!(size > BLOCK_HEADER_SIZE);
        let mut size = size;

        let current = self.block.get();
        if !current.is_null() {
            // SAFETY: current is the live head of the chain.
            let current_total = unsafe { BLOCK_HEADER_SIZE + (*current).size };
            let doubled = current_total
                .checked_mul(2)
                .expect("pool block size overflow");
            size = nearest_power(size.max(doubled));
            debug!("growing pool '{}' with a {size} byte block", self.name());
        }

        let layout = Layout::from_size_align(size, POOL_ALIGNMENT)
            .expect("invalid pool block layout");
        let raw = match S::acquire(layout) {
            Ok(raw) => raw,
            Err(err) => panic!("pool '{}': block allocation of {size} bytes failed: {err}", self.name()),
        };

        let block = raw.as_ptr().cast::<BlockHeader>();
        // SAFETY: raw is a fresh zeroed allocation of `size` >= header size.
        unsafe {
            (*block).prev = current;
            (*block).size = size - BLOCK_HEADER_SIZE;
            (*block).left = size - BLOCK_HEADER_SIZE;
            (*block).last_alloc_size = 0;
        }
        self.block.set(block);
    }

    fn alloc_impl(&self, size: usize) -> NonNull<u8> {
        if size == 0 || size > MAX_ALLOC_SIZE {
            panic!("invalid pool allocation of {size} bytes");
        }
        let size = align_up(size);

        let mut block = self.block.get();
        // SAFETY: block is the live head; after grow_block it is replaced by
        // a live head with at least `size` bytes left. The returned address
        // stays within the block payload.
        unsafe {
            if (*block).left < size {
                self.grow_block(size + BLOCK_HEADER_SIZE);
                block = self.block.get();
            }

            let mem = block_data(block).add((*block).size - (*block).left);
            (*block).left -= size;
            (*block).last_alloc_size = size;
            NonNull::new_unchecked(mem)
        }
    }

    /// Copies `s` into the pool, NUL-terminated.
    fn alloc_str_impl(&self, s: &str) -> NonNull<u8> {
        let mem = self.alloc_impl(s.len() + 1);

        // SAFETY: mem is valid for s.len() + 1 freshly allocated bytes and
        // cannot overlap a borrowed &str.
        unsafe {
            ptr::copy_nonoverlapping(s.as_ptr(), mem.as_ptr(), s.len());
            *mem.as_ptr().add(s.len()) = 0;
        }
        mem
    }

    /// Address of the newest block's most recent allocation, if any.
    ///
    /// # Safety
    ///
    /// The head block must be live.
    unsafe fn last_alloc(&self) -> Option<(NonNull<u8>, usize)> {
        let block = self.block.get();
        // SAFETY: per contract, block is live.
        unsafe {
            let last_size = (*block).last_alloc_size;
            if last_size == 0 {
                return None;
            }
            let offset = (*block).size - (*block).left - last_size;
            Some((NonNull::new_unchecked(block_data(block).add(offset)), last_size))
        }
    }

    unsafe fn free_impl(&self, mem: NonNull<u8>) -> FreeOutcome {
        // SAFETY: head block is live while the pool is.
        unsafe {
            match self.last_alloc() {
                Some((last, last_size)) if last == mem => {
                    // Zeroing keeps the zeroed-memory guarantee for whoever
                    // gets these bytes next, and turns use-after-free into a
                    // loud bug.
                    ptr::write_bytes(mem.as_ptr(), 0, last_size);
                    let block = self.block.get();
                    (*block).left += last_size;
                    (*block).last_alloc_size = 0;
                    FreeOutcome::Reclaimed
                }
                _ => FreeOutcome::Retained,
            }
        }
    }

    /// Extends the most recent allocation in place if `mem` is it and the
    /// block has room. `new_size` is already aligned.
    unsafe fn try_grow(&self, mem: NonNull<u8>, new_size: usize) -> bool {
        // SAFETY: head block is live while the pool is.
        unsafe {
            let Some((last, last_size)) = self.last_alloc() else {
                return false;
            };
            if last != mem {
                return false;
            }

            let block = self.block.get();
            if (*block).left < new_size - last_size {
                return false;
            }
            (*block).left -= new_size - last_size;
            (*block).last_alloc_size = new_size;
            true
        }
    }

    unsafe fn realloc_impl(
        &self,
        mem: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> NonNull<u8> {
        if new_size == 0 || new_size > MAX_ALLOC_SIZE {
            panic!("invalid pool allocation of {new_size} bytes");
        }

        let Some(mem) = mem else {
            return self.alloc_impl(new_size);
        };

        // Shrinking never reclaims the tail; the bytes stay reserved.
        if new_size <= old_size {
            return mem;
        }

        let new_size = align_up(new_size);

        // SAFETY: caller guarantees mem came from this pool and is valid
        // for old_size bytes; a fresh allocation cannot overlap it.
        unsafe {
            if self.try_grow(mem, new_size) {
                return mem;
            }
            let fresh = self.alloc_impl(new_size);
            ptr::copy_nonoverlapping(mem.as_ptr(), fresh.as_ptr(), old_size);
            fresh
        }
    }

    fn clear_impl(&self) {
        // SAFETY: the whole chain is live; released blocks are unlinked
        // before release and never touched again.
        unsafe {
            // Release every block except the oldest, which holds this
            // structure.
            let mut block = self.block.get();
            while !(*block).prev.is_null() {
                let dead = block;
                block = (*block).prev;
                self.block.set(block);
                release_block::<S>(dead);
            }

            // Zero exactly the used bytes past the bookkeeping prefix.
            let avail = (*block).size - self.base_size;
            ptr::write_bytes(
                block_data(block).add(self.base_size),
                0,
                avail - (*block).left,
            );
            (*block).left = avail;
            (*block).last_alloc_size = 0;
        }
    }

    fn stats_impl(&self) -> PoolStats {
        let mut stats = PoolStats {
            block_count: 0,
            total_capacity: 0,
            total_left: 0,
            base_size: self.base_size,
        };

        let mut block = self.block.get();
        // SAFETY: the chain is live and null-terminated at the oldest block.
        unsafe {
            while !block.is_null() {
                stats.block_count += 1;
                stats.total_capacity += (*block).size;
                stats.total_left += (*block).left;
                block = (*block).prev;
            }
        }
        stats
    }

    /// Destroys the pool: clears it, then releases the final block.
    ///
    /// # Safety
    ///
    /// `pool` must be live with a refcount of zero. The control structure
    /// lives inside the final block, so nothing may dereference `pool` once
    /// that block is released; all locals needed for the release are read
    /// first.
    unsafe fn destroy(pool: NonNull<Self>) {
        // SAFETY: pool is live until release_block below.
        unsafe {
            pool.as_ref().clear_impl();
            let block = pool.as_ref().block.get();
            release_block::<S>(block);
        }
    }
}

impl<S: BlockSource> PoolRef<S> {
    #[inline]
    fn pool(&self) -> &AllocOnlyPool<S> {
        // SAFETY: the handle contract: valid until the final release.
        unsafe { self.pool.as_ref() }
    }

    /// Copies `s` into the pool and returns the raw, NUL-terminated bytes.
    ///
    /// The usual request-scoped string helper: the copy lives until `clear`
    /// or destruction, no individual free needed.
    pub fn alloc_str(&self, s: &str) -> NonNull<u8> {
        self.pool().alloc_str_impl(s)
    }

    /// Memory-usage snapshot across the whole block chain.
    pub fn stats(&self) -> PoolStats {
        self.pool().stats_impl()
    }

    /// Current reference count.
    pub fn refcount(&self) -> u32 {
        self.pool().refcount.get()
    }
}

impl<S: BlockSource> Pool for PoolRef<S> {
    fn name(&self) -> &str {
        self.pool().name()
    }

    fn acquire(&self) {
        let pool = self.pool();
        let refcount = pool.refcount.get();
        if refcount == u32::MAX {
            panic!("pool '{}': refcount overflow", pool.name());
        }
        pool.refcount.set(refcount + 1);
    }

    unsafe fn release(&self) {
        let refcount = {
            let pool = self.pool();
            let refcount = pool.refcount.get();
            debug_assert!(refcount > 0, "pool released more times than acquired");
            pool.refcount.set(refcount - 1);
            refcount - 1
        };

        if refcount == 0 {
            // SAFETY: last reference; caller promises not to use the handle
            // again.
            unsafe { AllocOnlyPool::destroy(self.pool) };
        }
    }

    fn alloc(&self, size: usize) -> NonNull<u8> {
        self.pool().alloc_impl(size)
    }

    unsafe fn free(&self, mem: NonNull<u8>) -> FreeOutcome {
        // SAFETY: forwarded caller contract.
        unsafe { self.pool().free_impl(mem) }
    }

    unsafe fn realloc(
        &self,
        mem: Option<NonNull<u8>>,
        old_size: usize,
        new_size: usize,
    ) -> NonNull<u8> {
        // SAFETY: forwarded caller contract.
        unsafe { self.pool().realloc_impl(mem, old_size, new_size) }
    }

    fn clear(&self) {
        self.pool().clear_impl();
    }

    fn max_easy_alloc_size(&self) -> usize {
        // SAFETY: the head block is live while the pool is.
        unsafe { (*self.pool().block.get()).left }
    }
}

impl<S: BlockSource> fmt::Debug for PoolRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("PoolRef")
            .field("name", &self.name())
            .field("refcount", &self.refcount())
            .field("blocks", &stats.block_count)
            .field("capacity", &stats.total_capacity)
            .field("left", &stats.total_left)
            .finish()
    }
}
