//! Error types for the `granary` memory pools.
//!
//! These errors only travel across the [`BlockSource`](crate::BlockSource)
//! seam. The public pool surface has no recoverable error channel: running
//! out of memory or requesting an invalid size is treated as fatal and
//! escalates to a panic at the call site.

use std::fmt;

/// Errors produced while acquiring backing memory for pool blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The underlying allocator could not supply the requested block.
    OutOfMemory,

    /// A block was requested with a size the source cannot represent.
    InvalidBlockSize {
        /// The requested block size in bytes.
        size: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::InvalidBlockSize { size } => {
                write!(f, "invalid pool block size: {size} bytes")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for block-source operations.
pub type Result<T> = std::result::Result<T, Error>;
