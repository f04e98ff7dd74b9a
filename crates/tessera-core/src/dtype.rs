//! Numeric data types
//!
//! A [`DataType`] is a numeric family ([`Kind`]) plus the width in bits of one
//! real component. Complex types therefore occupy twice their nominal width:
//! `cf32` is two 32-bit floats, `ci4` is two 4-bit integers sharing a byte.
//!
//! | prefix | kind               | widths               |
//! |--------|--------------------|----------------------|
//! | `i`    | signed integer     | 1 2 4 8 16 32 64     |
//! | `u`    | unsigned integer   | 1 2 4 8 16 32 64     |
//! | `f`    | float              | 16 32 64 128         |
//! | `ci`   | complex signed int | 1 2 4 8 16 32 64     |
//! | `cf`   | complex float      | 16 32 64 128         |
//!
//! Types narrower than a byte are *packed*: several items share one byte and
//! an array stores them by folding its trailing dimension.

use crate::element::{Element, ElementType, RecordType};
use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use tessera_abi::dtype_code;

const INTEGER_WIDTHS: &[u32] = &[1, 2, 4, 8, 16, 32, 64];
const FLOAT_WIDTHS: &[u32] = &[16, 32, 64, 128];

/// Numeric family of a data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Int,
    UInt,
    Float,
    ComplexInt,
    ComplexFloat,
}

impl Kind {
    pub const ALL: [Kind; 5] = [Kind::Int, Kind::UInt, Kind::Float, Kind::ComplexInt, Kind::ComplexFloat];

    /// String prefix used in type names
    pub const fn prefix(self) -> &'static str {
        match self {
            Kind::Int => "i",
            Kind::UInt => "u",
            Kind::Float => "f",
            Kind::ComplexInt => "ci",
            Kind::ComplexFloat => "cf",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    pub const fn is_complex(self) -> bool {
        matches!(self, Kind::ComplexInt | Kind::ComplexFloat)
    }

    /// Component widths this family supports
    pub const fn widths(self) -> &'static [u32] {
        match self {
            Kind::Int | Kind::UInt | Kind::ComplexInt => INTEGER_WIDTHS,
            Kind::Float | Kind::ComplexFloat => FLOAT_WIDTHS,
        }
    }

    const fn family_bits(self) -> u32 {
        match self {
            Kind::Int | Kind::ComplexInt => dtype_code::INT_TYPE,
            Kind::UInt => dtype_code::UINT_TYPE,
            Kind::Float | Kind::ComplexFloat => dtype_code::FLOAT_TYPE,
        }
    }
}

/// A supported numeric type: family plus per-component bit width
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    kind: Kind,
    bits: u32,
}

macro_rules! data_type_consts {
    ($($name:ident = $kind:ident $bits:literal),* $(,)?) => {
        impl DataType {
            $(pub const $name: DataType = DataType { kind: Kind::$kind, bits: $bits };)*

            /// Every supported type, in table order
            pub const ALL: &'static [DataType] = &[$(DataType::$name),*];
        }
    };
}

data_type_consts! {
    I1 = Int 1, I2 = Int 2, I4 = Int 4, I8 = Int 8, I16 = Int 16, I32 = Int 32, I64 = Int 64,
    U1 = UInt 1, U2 = UInt 2, U4 = UInt 4, U8 = UInt 8, U16 = UInt 16, U32 = UInt 32, U64 = UInt 64,
    F16 = Float 16, F32 = Float 32, F64 = Float 64, F128 = Float 128,
    CI1 = ComplexInt 1, CI2 = ComplexInt 2, CI4 = ComplexInt 4, CI8 = ComplexInt 8,
    CI16 = ComplexInt 16, CI32 = ComplexInt 32, CI64 = ComplexInt 64,
    CF16 = ComplexFloat 16, CF32 = ComplexFloat 32, CF64 = ComplexFloat 64, CF128 = ComplexFloat 128,
}

impl DataType {
    /// Validate a `(kind, width)` pair against the supported table
    pub fn new(kind: Kind, bits: u32) -> Result<Self> {
        if kind.widths().contains(&bits) {
            Ok(Self { kind, bits })
        } else {
            Err(Error::UnsupportedType(format!("{}{}", kind.prefix(), bits)))
        }
    }

    /// Parse a type name such as `ci4` or `f32`
    pub fn parse(name: &str) -> Result<Self> {
        let unsupported = || Error::UnsupportedType(name.to_string());

        let split = name.find(|c: char| c.is_ascii_digit()).ok_or_else(unsupported)?;
        let (prefix, width) = name.split_at(split);
        let kind = Kind::from_prefix(prefix).ok_or_else(unsupported)?;
        let bits = width.parse::<u32>().map_err(|_| unsupported())?;

        Self::new(kind, bits).map_err(|_| unsupported())
    }

    /// Reflect a Rust element type
    pub fn of<T: Element>() -> Result<Self> {
        Self::from_element_type(T::ELEMENT_TYPE)
    }

    /// Reflect a host element type
    ///
    /// Booleans are stored as `u8`. Native complex types carry both
    /// components in `bytes`, so `Complex { bytes: 8 }` is `cf32`.
    pub fn from_element_type(element: ElementType) -> Result<Self> {
        let unsupported = || Error::UnsupportedType(format!("{element:?}"));
        let bits_of = |bytes: usize| {
            bytes
                .checked_mul(8)
                .and_then(|bits| u32::try_from(bits).ok())
                .ok_or_else(unsupported)
        };

        let (kind, bits) = match element {
            ElementType::Bool => (Kind::UInt, 8),
            ElementType::Int { bytes } => (Kind::Int, bits_of(bytes)?),
            ElementType::UInt { bytes } => (Kind::UInt, bits_of(bytes)?),
            ElementType::Float { bytes } => (Kind::Float, bits_of(bytes)?),
            ElementType::Complex { bytes } => (Kind::ComplexFloat, bits_of(bytes)? / 2),
            ElementType::Record(RecordType::ComplexNibble) => (Kind::ComplexInt, 4),
            ElementType::Record(RecordType::ComplexInt { component_bytes }) => {
                (Kind::ComplexInt, bits_of(component_bytes)?)
            }
            ElementType::Record(RecordType::ComplexHalf) => (Kind::ComplexFloat, 16),
            ElementType::Record(RecordType::Other { .. })
            | ElementType::Text
            | ElementType::Object
            | ElementType::DateTime => return Err(unsupported()),
        };

        Self::new(kind, bits).map_err(|_| unsupported())
    }

    /// Storage element used by host numeric libraries
    ///
    /// `ci1` and `ci2` map to a one-byte integer that only matches their
    /// storage size. Sub-byte real types have no host element.
    pub fn element_type(self) -> Result<ElementType> {
        let bytes = (self.bits / 8) as usize;
        match self.kind {
            Kind::Int | Kind::UInt if self.bits < 8 => Err(Error::UnsupportedType(format!(
                "{self} has no host element type"
            ))),
            Kind::Int => Ok(ElementType::Int { bytes }),
            Kind::UInt => Ok(ElementType::UInt { bytes }),
            Kind::Float => Ok(ElementType::Float { bytes }),
            Kind::ComplexInt => Ok(match self.bits {
                1 | 2 => ElementType::Int { bytes: 1 },
                4 => ElementType::Record(RecordType::ComplexNibble),
                _ => ElementType::Record(RecordType::ComplexInt { component_bytes: bytes }),
            }),
            Kind::ComplexFloat if self.bits == 16 => Ok(ElementType::Record(RecordType::ComplexHalf)),
            Kind::ComplexFloat => Ok(ElementType::Complex { bytes: 2 * bytes }),
        }
    }

    /// Native ABI code
    pub const fn dtype_code(self) -> u32 {
        let complex = if self.kind.is_complex() { dtype_code::COMPLEX_BIT } else { 0 };
        self.bits | self.kind.family_bits() | complex
    }

    /// Decode a native ABI code
    pub fn from_dtype_code(code: u32) -> Result<Self> {
        let unsupported = || Error::UnsupportedType(format!("dtype code {code:#06x}"));

        let known = dtype_code::NBIT_BITS | dtype_code::TYPE_BITS | dtype_code::COMPLEX_BIT;
        if code & !known != 0 {
            return Err(unsupported());
        }

        let complex = code & dtype_code::COMPLEX_BIT != 0;
        let kind = match (code & dtype_code::TYPE_BITS, complex) {
            (dtype_code::INT_TYPE, false) => Kind::Int,
            (dtype_code::INT_TYPE, true) => Kind::ComplexInt,
            (dtype_code::UINT_TYPE, false) => Kind::UInt,
            (dtype_code::FLOAT_TYPE, false) => Kind::Float,
            (dtype_code::FLOAT_TYPE, true) => Kind::ComplexFloat,
            _ => return Err(unsupported()),
        };

        Self::new(kind, code & dtype_code::NBIT_BITS).map_err(|_| unsupported())
    }

    pub const fn kind(self) -> Kind {
        self.kind
    }

    /// Width of one real component
    pub const fn bit_width(self) -> u32 {
        self.bits
    }

    pub const fn is_complex(self) -> bool {
        self.kind.is_complex()
    }

    /// Bits occupied by one item, both components included
    pub const fn itemsize_bits(self) -> u32 {
        if self.is_complex() {
            self.bits * 2
        } else {
            self.bits
        }
    }

    /// Bytes occupied by one item; undefined for packed types
    pub fn itemsize_bytes(self) -> Result<usize> {
        match self.itemsize_bits() {
            bits if bits < 8 => Err(Error::SubByteItemsize(self)),
            bits => Ok((bits / 8) as usize),
        }
    }

    /// Items per byte for packed types
    pub const fn packing_factor(self) -> Option<usize> {
        match self.itemsize_bits() {
            bits if bits < 8 => Some((8 / bits) as usize),
            _ => None,
        }
    }

    pub const fn is_packed(self) -> bool {
        self.itemsize_bits() < 8
    }

    /// Bytes per physical storage unit: the item size, or one byte for packed types
    pub(crate) const fn storage_bytes(self) -> usize {
        match self.itemsize_bits() {
            bits if bits < 8 => 1,
            bits => (bits / 8) as usize,
        }
    }

    /// Bytes per real component, for byte order handling
    pub(crate) const fn component_bytes(self) -> usize {
        if self.bits < 8 {
            1
        } else {
            (self.bits / 8) as usize
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.bits)
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({self})")
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        DataType::parse(&name).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        assert_eq!(DataType::ALL.len(), 29);
    }

    #[test]
    fn test_parse_rejects() {
        for name in ["", "f", "32", "x8", "i3", "f8", "cu8", "i8x", "cf256", "i99999999999"] {
            assert!(
                matches!(DataType::parse(name), Err(Error::UnsupportedType(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_itemsize() {
        assert_eq!(DataType::CI4.itemsize_bits(), 8);
        assert_eq!(DataType::CF32.itemsize_bits(), 64);
        assert_eq!(DataType::CI4.itemsize_bytes().unwrap(), 1);
        assert!(matches!(DataType::I4.itemsize_bytes(), Err(Error::SubByteItemsize(DataType::I4))));
        assert!(matches!(DataType::CI2.itemsize_bytes(), Err(Error::SubByteItemsize(_))));
    }

    #[test]
    fn test_packing() {
        assert_eq!(DataType::U1.packing_factor(), Some(8));
        assert_eq!(DataType::I4.packing_factor(), Some(2));
        assert_eq!(DataType::CI1.packing_factor(), Some(4));
        assert_eq!(DataType::CI2.packing_factor(), Some(2));
        assert_eq!(DataType::CI4.packing_factor(), None);
        assert!(!DataType::U8.is_packed());
    }

    #[test]
    fn test_dtype_codes_match_abi() {
        assert_eq!(DataType::I1.dtype_code(), dtype_code::I1);
        assert_eq!(DataType::U4.dtype_code(), dtype_code::U4);
        assert_eq!(DataType::F128.dtype_code(), dtype_code::F128);
        assert_eq!(DataType::CI4.dtype_code(), dtype_code::CI4);
        assert_eq!(DataType::CF16.dtype_code(), dtype_code::CF16);
        assert_eq!(DataType::CF128.dtype_code(), dtype_code::CF128);
    }

    #[test]
    fn test_from_dtype_code_rejects() {
        // complex unsigned has no encoding
        assert!(DataType::from_dtype_code(dtype_code::UINT_TYPE | dtype_code::COMPLEX_BIT | 8).is_err());
        assert!(DataType::from_dtype_code(dtype_code::FLOAT_TYPE | 8).is_err());
        assert!(DataType::from_dtype_code(0x0300 | 8).is_err());
        assert!(DataType::from_dtype_code(0x2000 | dtype_code::I8).is_err());
    }

    #[test]
    fn test_element_type_mapping() {
        assert_eq!(DataType::I16.element_type().unwrap(), ElementType::Int { bytes: 2 });
        assert_eq!(DataType::CI1.element_type().unwrap(), ElementType::Int { bytes: 1 });
        assert_eq!(DataType::CI2.element_type().unwrap(), ElementType::Int { bytes: 1 });
        assert_eq!(
            DataType::CI4.element_type().unwrap(),
            ElementType::Record(RecordType::ComplexNibble)
        );
        assert_eq!(
            DataType::CI16.element_type().unwrap(),
            ElementType::Record(RecordType::ComplexInt { component_bytes: 2 })
        );
        assert_eq!(
            DataType::CF16.element_type().unwrap(),
            ElementType::Record(RecordType::ComplexHalf)
        );
        assert_eq!(DataType::CF64.element_type().unwrap(), ElementType::Complex { bytes: 16 });
        assert!(DataType::U2.element_type().is_err());
        assert!(DataType::I4.element_type().is_err());
    }

    #[test]
    fn test_from_element_type_huge_widths() {
        for element in [
            ElementType::Int { bytes: usize::MAX },
            ElementType::Float { bytes: usize::MAX / 4 },
            ElementType::Complex { bytes: usize::MAX / 2 },
            ElementType::Record(RecordType::ComplexInt { component_bytes: usize::MAX }),
        ] {
            assert!(matches!(DataType::from_element_type(element), Err(Error::UnsupportedType(_))));
        }
        assert_eq!(DataType::from_element_type(ElementType::Int { bytes: 4 }).unwrap(), DataType::I32);
    }

    #[test]
    fn test_reflection() {
        assert_eq!(DataType::of::<bool>().unwrap(), DataType::U8);
        assert_eq!(DataType::of::<f32>().unwrap(), DataType::F32);
        assert_eq!(DataType::of::<half::f16>().unwrap(), DataType::F16);
        assert_eq!(DataType::of::<num_complex::Complex<f32>>().unwrap(), DataType::CF32);
        assert_eq!(DataType::of::<num_complex::Complex<f64>>().unwrap(), DataType::CF64);
        assert_eq!(DataType::of::<crate::ComplexNibble>().unwrap(), DataType::CI4);
        assert_eq!(DataType::of::<crate::ComplexInt<i32>>().unwrap(), DataType::CI32);
        assert_eq!(DataType::of::<crate::ComplexHalf>().unwrap(), DataType::CF16);

        for unsupported in [
            ElementType::Text,
            ElementType::Object,
            ElementType::DateTime,
            ElementType::Record(RecordType::Other { bytes: 12 }),
            ElementType::Int { bytes: 3 },
        ] {
            assert!(matches!(
                DataType::from_element_type(unsupported),
                Err(Error::UnsupportedType(_))
            ));
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&DataType::CI4).unwrap();
        assert_eq!(json, "\"ci4\"");
        let back: DataType = serde_json::from_str("\"cf32\"").unwrap();
        assert_eq!(back, DataType::CF32);
        assert!(serde_json::from_str::<DataType>("\"q8\"").is_err());
    }
}
