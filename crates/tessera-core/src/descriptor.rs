//! Export of arrays to the native kernel descriptor

use crate::array::Array;
use crate::error::{Error, Result};
use std::ffi::c_void;
use tessera_abi::{ArrayDescriptor, CBool, MAX_DIMS};

fn c_bool(value: bool) -> CBool {
    CBool::from(value)
}

impl Array {
    /// Describe this array for a native kernel
    ///
    /// The descriptor borrows the array's memory without keeping it alive;
    /// the array must outlive every use of the descriptor. Shapes are
    /// logical element counts, so packed types report their unfolded
    /// trailing dimension. Scalars are exported as a one-element vector.
    pub fn to_descriptor(&self) -> Result<ArrayDescriptor> {
        let rank = self.ndim();
        if rank > MAX_DIMS {
            return Err(Error::RankTooLarge { rank, max: MAX_DIMS });
        }

        let mut desc = ArrayDescriptor::empty();
        desc.data = self.data_handle().as_ptr() as *mut c_void;
        desc.space = self.space().code();
        desc.dtype = self.dtype().dtype_code();
        desc.big_endian = c_bool(!self.is_native());
        desc.conjugated = c_bool(self.is_conjugated());
        desc.immutable = c_bool(!self.is_writeable());

        if rank == 0 {
            desc.ndim = 1;
            desc.shape[0] = 1;
            desc.strides[0] = self.dtype().itemsize_bytes()? as i64;
            return Ok(desc);
        }

        desc.ndim = rank as i32;
        for (slot, &len) in desc.shape.iter_mut().zip(self.shape()) {
            *slot = len as i64;
        }
        for (slot, &stride) in desc.strides.iter_mut().zip(self.strides()) {
            *slot = stride as i64;
        }
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Array, ArrayOptions, DataType};
    use std::sync::Arc;
    use tessera_abi::{dtype_code, space_code};
    use tessera_memory::{SharedAllocator, SystemAllocator};

    fn system() -> SharedAllocator {
        Arc::new(SystemAllocator::new())
    }

    #[test]
    fn test_scalar_export() {
        let a = Array::zeros(&system(), &[], &ArrayOptions::new().with_dtype(DataType::CI16)).unwrap();
        let desc = a.to_descriptor().unwrap();
        assert_eq!(desc.ndim, 1);
        assert_eq!(desc.dims(), &[1]);
        assert_eq!(desc.byte_strides(), &[4]);
        assert_eq!(desc.dtype, dtype_code::CI16);
        assert_eq!(desc.space, space_code::SYSTEM);
    }

    #[test]
    fn test_flags() {
        let mut a = Array::zeros(&system(), &[2], &ArrayOptions::new().with_native(false)).unwrap();
        a.set_writeable(false);
        let desc = a.conj().to_descriptor().unwrap();
        assert_eq!(desc.big_endian, 1);
        assert_eq!(desc.conjugated, 1);
        assert_eq!(desc.immutable, 1);

        let fresh = Array::zeros(&system(), &[2], &ArrayOptions::new()).unwrap();
        let desc = fresh.to_descriptor().unwrap();
        assert_eq!((desc.big_endian, desc.conjugated, desc.immutable), (0, 0, 0));
    }

    #[test]
    fn test_data_pointer_includes_offset() {
        let a = Array::zeros(&system(), &[4, 4], &ArrayOptions::new()).unwrap();
        let row = a.select(0, 2).unwrap();
        let base = a.to_descriptor().unwrap().data as usize;
        let desc = row.to_descriptor().unwrap();
        assert_eq!(desc.data as usize - base, 32);
        assert_eq!(desc.dims(), &[4]);
        assert_eq!(desc.byte_strides(), &[4]);
    }
}
