//! Memory spaces and raw allocator primitives for tessera
//!
//! This crate provides:
//! - **Spaces**: the named memory domains an array can live in
//! - **Handles**: opaque addresses into a space
//! - **Allocator Trait**: the raw primitives arrays are built on
//! - **SystemAllocator**: aligned, zeroed host RAM
//! - **EmulatedAllocator**: every space served from host RAM, for tests and
//!   accelerator-less hosts
//!
//! # Usage
//!
//! ```rust
//! use tessera_memory::{EmulatedAllocator, Space, SpaceAllocator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let alloc = EmulatedAllocator::new();
//! let handle = alloc.allocate(Space::Cuda, 1024)?;
//! assert_eq!(alloc.space_of(handle)?, Space::Cuda);
//!
//! // SAFETY: handle is live and was allocated in Space::Cuda.
//! unsafe { alloc.release(handle, Space::Cuda)? };
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod emulated;
pub mod error;
pub mod handle;
pub mod space;
pub mod system;
mod table;

pub use allocator::{SharedAllocator, SpaceAllocator};
pub use emulated::EmulatedAllocator;
pub use error::{MemoryError, Result};
pub use handle::{MemoryHandle, Pitched};
pub use space::{accessible, Space};
pub use system::SystemAllocator;
pub use table::ALLOCATION_ALIGN;
