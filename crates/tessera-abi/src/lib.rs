//! C-compatible array descriptor for native compute kernels
//!
//! Kernels never see Rust types. An array crosses the boundary as a single
//! [`ArrayDescriptor`] whose layout is fixed: field order, widths and the
//! [`MAX_DIMS`] capacity are part of the ABI and must not change without
//! bumping [`ABI_VERSION`].
//!
//! ```text
//! ┌──────────┬───────┬───────┬──────┬──────────────┬────────────────┬───────┐
//! │ data ptr │ space │ dtype │ ndim │ shape[100]   │ strides[100]   │ flags │
//! └──────────┴───────┴───────┴──────┴──────────────┴────────────────┴───────┘
//! ```

use std::ffi::c_void;
use std::ptr;

/// Current ABI version
pub const ABI_VERSION: u32 = 1;

/// Maximum rank a descriptor can carry
pub const MAX_DIMS: usize = 100;

/// C boolean (`0` = false, anything else = true)
pub type CBool = i32;

/// Memory space codes as seen by kernels
pub mod space_code {
    pub const AUTO: i32 = 0;
    pub const SYSTEM: i32 = 1;
    pub const CUDA: i32 = 2;
    pub const CUDA_HOST: i32 = 3;
    pub const CUDA_MANAGED: i32 = 4;
}

/// Element type codes as seen by kernels
///
/// A code packs three fields:
///
/// - bits `0x00FF`: width of one real component in bits
/// - bits `0x0F00`: numeric family (signed, unsigned, float)
/// - bit `0x1000`: set for complex types
pub mod dtype_code {
    pub const NBIT_BITS: u32 = 0x00FF;
    pub const TYPE_BITS: u32 = 0x0F00;
    pub const INT_TYPE: u32 = 0x0000;
    pub const UINT_TYPE: u32 = 0x0100;
    pub const FLOAT_TYPE: u32 = 0x0200;
    pub const COMPLEX_BIT: u32 = 0x1000;

    pub const I1: u32 = 1 | INT_TYPE;
    pub const I2: u32 = 2 | INT_TYPE;
    pub const I4: u32 = 4 | INT_TYPE;
    pub const I8: u32 = 8 | INT_TYPE;
    pub const I16: u32 = 16 | INT_TYPE;
    pub const I32: u32 = 32 | INT_TYPE;
    pub const I64: u32 = 64 | INT_TYPE;

    pub const U1: u32 = 1 | UINT_TYPE;
    pub const U2: u32 = 2 | UINT_TYPE;
    pub const U4: u32 = 4 | UINT_TYPE;
    pub const U8: u32 = 8 | UINT_TYPE;
    pub const U16: u32 = 16 | UINT_TYPE;
    pub const U32: u32 = 32 | UINT_TYPE;
    pub const U64: u32 = 64 | UINT_TYPE;

    pub const F16: u32 = 16 | FLOAT_TYPE;
    pub const F32: u32 = 32 | FLOAT_TYPE;
    pub const F64: u32 = 64 | FLOAT_TYPE;
    pub const F128: u32 = 128 | FLOAT_TYPE;

    pub const CI1: u32 = 1 | INT_TYPE | COMPLEX_BIT;
    pub const CI2: u32 = 2 | INT_TYPE | COMPLEX_BIT;
    pub const CI4: u32 = 4 | INT_TYPE | COMPLEX_BIT;
    pub const CI8: u32 = 8 | INT_TYPE | COMPLEX_BIT;
    pub const CI16: u32 = 16 | INT_TYPE | COMPLEX_BIT;
    pub const CI32: u32 = 32 | INT_TYPE | COMPLEX_BIT;
    pub const CI64: u32 = 64 | INT_TYPE | COMPLEX_BIT;

    pub const CF16: u32 = 16 | FLOAT_TYPE | COMPLEX_BIT;
    pub const CF32: u32 = 32 | FLOAT_TYPE | COMPLEX_BIT;
    pub const CF64: u32 = 64 | FLOAT_TYPE | COMPLEX_BIT;
    pub const CF128: u32 = 128 | FLOAT_TYPE | COMPLEX_BIT;
}

/// Array descriptor handed to native kernels
///
/// `shape` holds element counts (never byte counts, even for packed sub-byte
/// types) and `strides` holds byte offsets. Only the first `ndim` entries of
/// each are meaningful; the rest are zero.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ArrayDescriptor {
    pub data: *mut c_void,
    pub space: i32,
    pub dtype: u32,
    pub ndim: i32,
    pub shape: [i64; MAX_DIMS],
    pub strides: [i64; MAX_DIMS],
    pub big_endian: CBool,
    pub conjugated: CBool,
    pub immutable: CBool,
}

impl ArrayDescriptor {
    /// Descriptor with a null data pointer and every field zeroed
    pub const fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            space: space_code::AUTO,
            dtype: 0,
            ndim: 0,
            shape: [0; MAX_DIMS],
            strides: [0; MAX_DIMS],
            big_endian: 0,
            conjugated: 0,
            immutable: 0,
        }
    }

    /// Meaningful part of `shape`
    pub fn dims(&self) -> &[i64] {
        &self.shape[..self.rank()]
    }

    /// Meaningful part of `strides`
    pub fn byte_strides(&self) -> &[i64] {
        &self.strides[..self.rank()]
    }

    fn rank(&self) -> usize {
        (self.ndim.max(0) as usize).min(MAX_DIMS)
    }
}

impl Default for ArrayDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for ArrayDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArrayDescriptor")
            .field("data", &self.data)
            .field("space", &self.space)
            .field("dtype", &format_args!("{:#06x}", self.dtype))
            .field("ndim", &self.ndim)
            .field("shape", &self.dims())
            .field("strides", &self.byte_strides())
            .field("big_endian", &self.big_endian)
            .field("conjugated", &self.conjugated)
            .field("immutable", &self.immutable)
            .finish()
    }
}

/// Kernel entry point taking one input and one output array
pub type KernelFn = unsafe extern "C" fn(input: *const ArrayDescriptor, output: *const ArrayDescriptor) -> i32;
