//! Factory for request-scoped pools.
//!
//! `PoolFactory` is a cheap way to stamp out pools with a configured size
//! hint. It does not pool or reuse anything: each call creates a fresh pool,
//! and the caller releases it when the request is done. Creation cost is one
//! block allocation, which makes reuse machinery unnecessary.

use crate::alloconly::{AllocOnlyPool, PoolRef};

/// Creates pools with a fixed first-block size hint.
///
/// # Examples
///
/// ```
/// use granary_mem::{Pool, PoolFactory};
///
/// let factory = PoolFactory::new(2048);
///
/// let pool = factory.create("auth request");
/// let _scratch = pool.alloc(128);
///
/// // Request done: everything goes away at once.
/// unsafe { pool.release() };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PoolFactory {
    size_hint: usize,
}

impl PoolFactory {
    /// Creates a factory whose pools start with `size_hint` byte blocks.
    #[must_use]
    pub const fn new(size_hint: usize) -> Self {
        Self { size_hint }
    }

    /// Creates a fresh pool named `name`.
    ///
    /// # Panics
    ///
    /// Panics if the pool's first block cannot be allocated.
    #[must_use]
    pub fn create(&self, name: &str) -> PoolRef {
        AllocOnlyPool::new(name, self.size_hint)
    }

    /// The configured first-block size hint in bytes.
    #[must_use]
    pub const fn size_hint(&self) -> usize {
        self.size_hint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;

    #[test]
    fn test_factory_creates_independent_pools() {
        let factory = PoolFactory::new(512);

        let a = factory.create("a");
        let b = factory.create("b");

        assert_eq!(a.name(), "a");
        assert_eq!(b.name(), "b");

        let mem_a = a.alloc(32);
        let mem_b = b.alloc(32);
        assert_ne!(mem_a, mem_b);

        unsafe {
            a.release();
            b.release();
        }
    }

    #[test]
    fn test_factory_is_copy_and_const() {
        const FACTORY: PoolFactory = PoolFactory::new(1024);
        let copy = FACTORY;

        assert_eq!(copy.size_hint(), 1024);

        let pool = copy.create("copied");
        unsafe { pool.release() };
    }
}
