//! Host element types and their reflection
//!
//! [`ElementType`] describes how a host numeric library stores one element.
//! Rust types that can back host-side data implement [`Element`], which ties
//! them to their [`ElementType`] and, through
//! [`DataType::of`](crate::DataType::of), to a tessera data type.
//!
//! Three storage records have no native Rust equivalent and are defined here:
//!
//! - [`ComplexNibble`]: `ci4`, both components in one byte
//! - [`ComplexInt`]: `ci8`..`ci64`, adjacent `{re, im}` integers
//! - [`ComplexHalf`]: `cf16`, adjacent `{re, im}` half floats

use bytemuck::{Pod, Zeroable};
use half::f16;
use num_complex::Complex;

/// Storage record kinds beyond plain scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// One byte holding a 4-bit real and a 4-bit imaginary part
    ComplexNibble,
    /// `{re, im}` pair of signed integers
    ComplexInt { component_bytes: usize },
    /// `{re, im}` pair of half floats
    ComplexHalf,
    /// Any other structured record
    Other { bytes: usize },
}

/// How a host library stores a single element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    Int { bytes: usize },
    UInt { bytes: usize },
    Float { bytes: usize },
    /// Native floating-point complex; `bytes` covers both components
    Complex { bytes: usize },
    Record(RecordType),
    Text,
    Object,
    DateTime,
}

impl ElementType {
    /// Storage size in bytes, if fixed
    pub fn itemsize(self) -> Option<usize> {
        match self {
            ElementType::Bool => Some(1),
            ElementType::Int { bytes }
            | ElementType::UInt { bytes }
            | ElementType::Float { bytes }
            | ElementType::Complex { bytes } => Some(bytes),
            ElementType::Record(RecordType::ComplexNibble) => Some(1),
            ElementType::Record(RecordType::ComplexInt { component_bytes }) => Some(2 * component_bytes),
            ElementType::Record(RecordType::ComplexHalf) => Some(4),
            ElementType::Record(RecordType::Other { bytes }) => Some(bytes),
            ElementType::Text | ElementType::Object | ElementType::DateTime => None,
        }
    }
}

/// A Rust type usable as host-side element storage
pub trait Element: Copy + Send + Sync + 'static {
    const ELEMENT_TYPE: ElementType;
}

macro_rules! impl_element {
    ($($ty:ty => $et:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const ELEMENT_TYPE: ElementType = $et;
            }
        )*
    };
}

impl_element! {
    bool => ElementType::Bool,
    i8 => ElementType::Int { bytes: 1 },
    i16 => ElementType::Int { bytes: 2 },
    i32 => ElementType::Int { bytes: 4 },
    i64 => ElementType::Int { bytes: 8 },
    u8 => ElementType::UInt { bytes: 1 },
    u16 => ElementType::UInt { bytes: 2 },
    u32 => ElementType::UInt { bytes: 4 },
    u64 => ElementType::UInt { bytes: 8 },
    f16 => ElementType::Float { bytes: 2 },
    f32 => ElementType::Float { bytes: 4 },
    f64 => ElementType::Float { bytes: 8 },
    Complex<f32> => ElementType::Complex { bytes: 8 },
    Complex<f64> => ElementType::Complex { bytes: 16 },
    ComplexNibble => ElementType::Record(RecordType::ComplexNibble),
    ComplexHalf => ElementType::Record(RecordType::ComplexHalf),
    ComplexInt<i8> => ElementType::Record(RecordType::ComplexInt { component_bytes: 1 }),
    ComplexInt<i16> => ElementType::Record(RecordType::ComplexInt { component_bytes: 2 }),
    ComplexInt<i32> => ElementType::Record(RecordType::ComplexInt { component_bytes: 4 }),
    ComplexInt<i64> => ElementType::Record(RecordType::ComplexInt { component_bytes: 8 }),
}

/// Complex integer with adjacent equal-width components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct ComplexInt<T> {
    pub re: T,
    pub im: T,
}

impl<T> ComplexInt<T> {
    pub const fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

// SAFETY: two fields of the same Pod type under repr(C) leave no padding.
unsafe impl<T: Pod> Zeroable for ComplexInt<T> {}
unsafe impl<T: Pod> Pod for ComplexInt<T> {}

/// `ci4` element: real part in the high nibble, imaginary in the low nibble
///
/// Both nibbles are two's-complement, so each component ranges over `-8..=7`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct ComplexNibble(pub u8);

impl ComplexNibble {
    /// Pack two components, keeping the low four bits of each
    pub const fn new(re: i8, im: i8) -> Self {
        Self((((re as u8) & 0x0F) << 4) | ((im as u8) & 0x0F))
    }

    pub const fn re(self) -> i8 {
        (self.0 as i8) >> 4
    }

    pub const fn im(self) -> i8 {
        ((self.0 << 4) as i8) >> 4
    }
}

/// `cf16` element
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ComplexHalf {
    pub re: f16,
    pub im: f16,
}

impl ComplexHalf {
    pub const fn new(re: f16, im: f16) -> Self {
        Self { re, im }
    }

    pub fn from_f32(re: f32, im: f32) -> Self {
        Self::new(f16::from_f32(re), f16::from_f32(im))
    }
}
