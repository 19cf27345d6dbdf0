//! Error types for pool construction
//!
//! Only construction can fail. Exhausting a region after construction is
//! deliberately not an error value: the hot allocation path carries no
//! bounds check, and over-allocation surfaces as a hardware trap that the
//! fault handler attributes before the process terminates.

use thiserror::Error;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Memory operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// The virtual-memory reservation failed
    #[error("out of memory: failed to reserve {requested} bytes of address space")]
    OutOfMemory {
        /// Number of bytes the reservation asked for
        requested: usize,
    },

    /// Every registry slot is already claimed by a live allocator
    #[error("too many allocators: registry capacity of {capacity} exhausted")]
    TooManyAllocators {
        /// Fixed capacity of the process-wide registry
        capacity: usize,
    },
}
