//! Error types for tessera-core operations

use crate::dtype::DataType;
use tessera_memory::MemoryError;

/// Result type for tessera-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tessera-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Type string, element type or ABI code outside the supported table
    #[error("Unsupported data type: {0}")]
    UnsupportedType(String),

    /// Sub-byte type whose trailing dimension cannot be packed
    #[error("Array cannot be packed: {0}")]
    Packing(String),

    /// Byte item size requested for a type narrower than one byte
    #[error("Item size is undefined for {0}: fewer than 8 bits per item")]
    SubByteItemsize(DataType),

    /// Source and destination disagree on type or shape
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Strided layout the transfer engine cannot express
    #[error("Unsupported array layout: {0}")]
    UnsupportedLayout(String),

    /// Rank exceeds what the native descriptor can carry
    #[error("Rank {rank} exceeds the descriptor limit of {max} dimensions")]
    RankTooLarge { rank: usize, max: usize },

    /// Reinterpretation or view arguments incompatible with the layout
    #[error("Invalid view: {0}")]
    InvalidView(String),

    /// Shape, strides or data length inconsistent with the buffer
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Typed host access with an element type that does not match the array
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    /// Write into an array marked read-only
    #[error("Array is not writeable")]
    ReadOnly,

    /// Failure reported by the memory space allocator
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl Error {
    /// Whether the caller can retry after changing the array layout
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::UnsupportedLayout(_))
    }
}
