//! # tessera-core - Typed, Memory-Space-Aware Arrays
//!
//! Multidimensional arrays whose bytes may live in host RAM, pinned host
//! memory, unified memory or accelerator memory, with exact binary layouts
//! for non-standard numeric types.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   view / conj / permute / narrow / slice / select
//! │    Array     │ ─────────────────────────────────────────────────┐
//! │ shape,strides│                                                  │
//! │ dtype, flags │ ◄── get / set / copy / fill / byteswap ──┐       │
//! └──────┬───────┘                                          │       │
//!        │                                           ┌──────┴─────┐ │
//!        ▼                                           │  transfer  │ │
//! ┌──────────────┐      ┌──────────────────┐         │   engine   │ │
//! │    Buffer    │ ───► │  SpaceAllocator  │ ◄────── └────────────┘ │
//! │ + Allocation │      │ (tessera-memory) │                        │
//! └──────────────┘      └──────────────────┘                        │
//!        ▲                                                          │
//!        └──────────────────── shared guard ────────────────────────┘
//! ```
//!
//! - **DataType**: `i`, `u`, `f`, `ci`, `cf` families with per-component
//!   widths, including packed sub-byte types
//! - **Array**: logical shape over physical byte strides
//! - **Transfers**: flat or pitched copies between any two spaces
//! - **Descriptor**: fixed-layout export for native kernels
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tessera_core::prelude::*;
//! use tessera_memory::{EmulatedAllocator, SharedAllocator, Space};
//!
//! # fn main() -> Result<()> {
//! let alloc: SharedAllocator = Arc::new(EmulatedAllocator::new());
//!
//! let host = Array::from_slice(&alloc, &[2, 3], &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &ArrayOptions::default())?;
//! let device = host.copy(Some(Space::Cuda))?;
//! device.synchronize()?;
//!
//! let back = device.get()?;
//! assert_eq!(back.to_vec::<f32>()?, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//!
//! let desc = device.to_descriptor()?;
//! assert_eq!(desc.dims(), &[2, 3]);
//! # Ok(())
//! # }
//! ```

pub mod array;
pub mod buffer;
mod descriptor;
pub mod dtype;
pub mod element;
pub mod error;
mod layout;
pub mod options;
mod transfer;

pub use array::{Array, RawParts};
pub use buffer::{Allocation, Buffer, Ownership};
pub use dtype::{DataType, Kind};
pub use element::{ComplexHalf, ComplexInt, ComplexNibble, Element, ElementType, RecordType};
pub use error::{Error, Result};
pub use options::ArrayOptions;

/// Common imports
pub mod prelude {
    pub use crate::array::{Array, RawParts};
    pub use crate::buffer::Ownership;
    pub use crate::dtype::DataType;
    pub use crate::element::{ComplexHalf, ComplexInt, ComplexNibble, Element};
    pub use crate::error::{Error, Result};
    pub use crate::options::ArrayOptions;
}
