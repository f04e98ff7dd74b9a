//! Error types for memory space operations

use crate::space::Space;

/// Result type for memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors raised by space allocators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Allocation could not be satisfied
    #[error("out of memory in space '{space}': requested {requested} bytes, {available} bytes available")]
    OutOfMemory {
        space: Space,
        requested: usize,
        available: usize,
    },

    /// The allocator does not manage this space
    #[error("space '{0}' is not supported by this allocator")]
    UnsupportedSpace(Space),

    /// Handle is not the base of a live allocation
    #[error("invalid memory handle: {0:#x}")]
    InvalidHandle(usize),

    /// Handle was released into a different space than it was allocated in
    #[error("handle {handle:#x} belongs to space '{actual}', not '{expected}'")]
    SpaceMismatch {
        handle: usize,
        expected: Space,
        actual: Space,
    },

    /// Space name could not be parsed
    #[error("unknown memory space: {0}")]
    UnknownSpace(String),
}

impl MemoryError {
    /// Create an out-of-memory error
    pub fn out_of_memory(space: Space, requested: usize, available: usize) -> Self {
        Self::OutOfMemory {
            space,
            requested,
            available,
        }
    }

    /// Check whether this error reports an exhausted allocator
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}
