//! Construction options for new arrays

use crate::dtype::DataType;
use serde::{Deserialize, Serialize};
use tessera_memory::Space;

/// Options for [`Array::zeros`](crate::Array::zeros) and friends
///
/// | field        | default           |
/// |--------------|-------------------|
/// | `space`      | `Space::System`   |
/// | `dtype`      | `f32`             |
/// | `native`     | `true`            |
/// | `conjugated` | `false`           |
///
/// Missing fields fall back to these defaults when deserializing:
///
/// ```rust
/// use tessera_core::{ArrayOptions, DataType};
/// use tessera_memory::Space;
///
/// let opts: ArrayOptions = serde_json::from_str(r#"{"space": "cuda", "dtype": "ci8"}"#).unwrap();
/// assert_eq!(opts.space, Space::Cuda);
/// assert_eq!(opts.dtype, DataType::CI8);
/// assert!(opts.native);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayOptions {
    pub space: Space,
    pub dtype: DataType,
    /// Stored in host byte order
    pub native: bool,
    pub conjugated: bool,
}

impl Default for ArrayOptions {
    fn default() -> Self {
        Self {
            space: Space::System,
            dtype: DataType::F32,
            native: true,
            conjugated: false,
        }
    }
}

impl ArrayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_space(mut self, space: Space) -> Self {
        self.space = space;
        self
    }

    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    pub fn with_conjugated(mut self, conjugated: bool) -> Self {
        self.conjugated = conjugated;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = ArrayOptions::default();
        assert_eq!(opts.space, Space::System);
        assert_eq!(opts.dtype, DataType::F32);
        assert!(opts.native);
        assert!(!opts.conjugated);
    }

    #[test]
    fn test_builder() {
        let opts = ArrayOptions::new()
            .with_space(Space::CudaHost)
            .with_dtype(DataType::CI4)
            .with_native(false)
            .with_conjugated(true);
        assert_eq!(opts.space, Space::CudaHost);
        assert_eq!(opts.dtype, DataType::CI4);
        assert!(!opts.native);
        assert!(opts.conjugated);
    }

    #[test]
    fn test_json_roundtrip() {
        let opts = ArrayOptions::new().with_dtype(DataType::CF16).with_space(Space::CudaManaged);
        let json = serde_json::to_string(&opts).unwrap();
        assert_eq!(
            json,
            r#"{"space":"cuda_managed","dtype":"cf16","native":true,"conjugated":false}"#
        );
        assert_eq!(serde_json::from_str::<ArrayOptions>(&json).unwrap(), opts);
    }

    #[test]
    fn test_json_rejects_unknown_dtype() {
        assert!(serde_json::from_str::<ArrayOptions>(r#"{"dtype": "i3"}"#).is_err());
    }
}
