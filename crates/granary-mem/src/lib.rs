//! Alloc-only memory pools for the `granary` workspace.
//!
//! A pool hands out zeroed, aligned memory by bumping through a chain of
//! growable blocks. There is no per-object free bookkeeping: only the single
//! most recent allocation can be reclaimed (or regrown in place), and
//! everything else lives until the pool is cleared or destroyed. That
//! trade-off buys O(1) allocation and bulk reclamation for request-scoped
//! data.
//!
//! - [`Pool`]: the capability set consumers depend on
//! - [`AllocOnlyPool`] / [`PoolRef`]: the concrete pool and its refcounted
//!   handle
//! - [`BlockSource`]: strategy seam for the backing block memory
//! - [`PoolFactory`]: stamps out fresh pools per request
//!
//! Pools are strictly single-threaded; share a handle across collaborators
//! with [`Pool::acquire`]/[`Pool::release`], never across threads.
//!
//! # Example
//!
//! ```
//! use granary_mem::{AllocOnlyPool, FreeOutcome, Pool};
//!
//! let pool = AllocOnlyPool::new("request", 1024);
//!
//! let scratch = pool.alloc(64);
//! unsafe { scratch.as_ptr().write(42) };
//!
//! // Only the most recent allocation can be taken back.
//! assert_eq!(unsafe { pool.free(scratch) }, FreeOutcome::Reclaimed);
//!
//! // Bulk reset: the handle stays valid.
//! pool.clear();
//! assert_eq!(pool.name(), "request");
//!
//! // Last release destroys the pool and all its blocks.
//! unsafe { pool.release() };
//! ```

pub mod alloconly;
pub mod error;
pub mod factory;
pub mod pool;
pub mod source;

pub use alloconly::{AllocOnlyPool, MAX_ALLOC_SIZE, POOL_ALIGNMENT, PoolRef};
pub use error::{Error, Result};
pub use factory::PoolFactory;
pub use pool::{FreeOutcome, Pool, PoolStats};
pub use source::{BlockSource, SystemSource};
