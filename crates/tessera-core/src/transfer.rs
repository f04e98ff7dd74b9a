//! Moving bytes between arrays
//!
//! Every read, write and copy reduces to one two-array transfer:
//!
//! 1. type and logical shape must match exactly
//! 2. both layouts are squeezed (unit axes dropped, chained axes merged),
//!    keeping the squeezed form only if both sides squeeze to the same shape
//! 3. two contiguous layouts move as one flat copy
//! 4. rank 1 and 2 layouts move as a pitched 2D copy; rank 2 needs a
//!    byte-contiguous inner axis on both sides
//! 5. anything else is [`Error::UnsupportedLayout`]
//!
//! When both arrays are host-accessible the bytes are moved here with plain
//! pointer copies. Otherwise the allocator's copy primitive is used, which
//! may complete asynchronously: call [`Array::synchronize`] before reading
//! the destination from the host.
//!
//! Allocator copies require disjoint ranges, and a row-by-row copy can read
//! rows it has already overwritten, so overlapping views of one buffer are
//! staged through a private contiguous copy. Only a flat host copy moves
//! overlapping bytes directly.

use crate::array::{Array, RawParts};
use crate::error::{Error, Result};
use crate::layout::{self, Squeezed};
use crate::options::ArrayOptions;
use std::ptr;
use tessera_memory::{MemoryHandle, Pitched, Space};
use tessera_tracing::TransferSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyPlan {
    Flat {
        bytes: usize,
    },
    Pitched {
        width: usize,
        height: usize,
        dst_pitch: usize,
        src_pitch: usize,
    },
}

impl CopyPlan {
    fn path(self) -> &'static str {
        match self {
            CopyPlan::Flat { .. } => "flat",
            CopyPlan::Pitched { .. } => "2d",
        }
    }

    fn bytes(self) -> usize {
        match self {
            CopyPlan::Flat { bytes } => bytes,
            CopyPlan::Pitched { width, height, .. } => width * height,
        }
    }
}

fn physical_layout(array: &Array) -> Squeezed {
    Squeezed {
        shape: array.physical_shape(),
        strides: array.strides().to_vec(),
    }
}

/// Choose how to move bytes between two layouts of identical physical shape
fn plan_copy(dst: &Array, src: &Array) -> Result<CopyPlan> {
    let itemsize = dst.dtype().storage_bytes();
    let (full_dst, full_src) = (physical_layout(dst), physical_layout(src));

    let squeezed_dst = layout::squeeze(&full_dst.shape, &full_dst.strides, itemsize);
    let squeezed_src = layout::squeeze(&full_src.shape, &full_src.strides, itemsize);
    let (d, s) = if squeezed_dst.shape == squeezed_src.shape {
        (squeezed_dst, squeezed_src)
    } else {
        (full_dst, full_src)
    };

    if layout::is_row_major(&d.shape, &d.strides, itemsize) && layout::is_row_major(&s.shape, &s.strides, itemsize) {
        return Ok(CopyPlan::Flat { bytes: dst.nbytes() });
    }

    match d.shape.len() {
        1 => Ok(CopyPlan::Pitched {
            width: itemsize,
            height: d.shape[0],
            dst_pitch: d.strides[0],
            src_pitch: s.strides[0],
        }),
        2 => {
            let inner_ok = |l: &Squeezed| l.shape[1] == 1 || l.strides[1] == itemsize;
            if !(inner_ok(&d) && inner_ok(&s)) {
                return Err(Error::UnsupportedLayout(format!(
                    "2D copy needs a contiguous inner axis, got strides {:?} and {:?}",
                    d.strides, s.strides
                )));
            }
            Ok(CopyPlan::Pitched {
                width: d.shape[1] * itemsize,
                height: d.shape[0],
                dst_pitch: d.strides[0],
                src_pitch: s.strides[0],
            })
        }
        rank => Err(Error::UnsupportedLayout(format!(
            "rank {rank} strided copy (shape {:?}, strides {:?} and {:?})",
            d.shape, d.strides, s.strides
        ))),
    }
}

/// Addresses `[start, end)` touched by a non-empty array
fn byte_span(array: &Array) -> Option<(usize, usize)> {
    if array.is_empty() {
        return None;
    }
    let extent = layout::max_extent(&array.physical_shape(), array.strides(), array.dtype().storage_bytes())?;
    let start = array.data_handle().addr();
    Some((start, start.checked_add(extent)?))
}

fn overlaps(a: &Array, b: &Array) -> bool {
    match (byte_span(a), byte_span(b)) {
        (Some((a_start, a_end)), Some((b_start, b_end))) => a_start < b_end && b_start < a_end,
        _ => false,
    }
}

/// Move bytes from `src` into `dst`
fn transfer(dst: &Array, src: &Array) -> Result<()> {
    if dst.dtype() != src.dtype() || dst.shape() != src.shape() {
        return Err(Error::ShapeMismatch(format!(
            "cannot copy {}{:?} into {}{:?}",
            src.dtype(),
            src.shape(),
            dst.dtype(),
            dst.shape()
        )));
    }
    dst.ensure_writeable()?;
    if dst.is_empty() {
        return Ok(());
    }

    let plan = plan_copy(dst, src)?;
    let (dst_space, src_space) = (dst.space(), src.space());
    let on_host = dst_space.is_host_accessible() && src_space.is_host_accessible();

    if overlaps(dst, src) && !(on_host && matches!(plan, CopyPlan::Flat { .. })) {
        tracing::debug!(space = %src_space, bytes = plan.bytes(), "transfer_staged");
        let staged = src.copy(None)?;
        transfer(dst, &staged)?;
        // the staging buffer must outlive any pending device copy out of it
        return staged.synchronize();
    }

    let (dst_ptr, src_ptr) = (dst.data_handle(), src.data_handle());
    let _span = TransferSpan::new(plan.path(), plan.bytes()).between(src_space.name(), dst_space.name());

    if on_host {
        // SAFETY: both arrays passed their bounds checks at construction, so
        // every row touched lies inside the respective buffers.
        unsafe { host_copy(plan, dst_ptr, src_ptr) };
        return Ok(());
    }

    let allocator = if src_space.is_host_accessible() {
        dst.allocator()
    } else {
        src.allocator()
    };

    // SAFETY: as above; the allocator receives each handle with its own space,
    // and overlapping ranges were staged away.
    unsafe {
        match plan {
            CopyPlan::Flat { bytes } => allocator.copy_flat(dst_ptr, dst_space, src_ptr, src_space, bytes)?,
            CopyPlan::Pitched {
                width,
                height,
                dst_pitch,
                src_pitch,
            } => allocator.copy_2d(
                Pitched::new(dst_ptr, dst_pitch),
                dst_space,
                Pitched::new(src_ptr, src_pitch),
                src_space,
                width,
                height,
            )?,
        }
    }
    Ok(())
}

/// Host pointer copy; a flat copy tolerates overlapping views of one buffer
unsafe fn host_copy(plan: CopyPlan, dst: MemoryHandle, src: MemoryHandle) {
    match plan {
        CopyPlan::Flat { bytes } => ptr::copy(src.as_ptr() as *const u8, dst.as_ptr(), bytes),
        CopyPlan::Pitched {
            width,
            height,
            dst_pitch,
            src_pitch,
        } => {
            for row in 0..height {
                let s = src.byte_add(row * src_pitch);
                let d = dst.byte_add(row * dst_pitch);
                ptr::copy(s.as_ptr() as *const u8, d.as_ptr(), width);
            }
        }
    }
}

impl Array {
    /// Host-memory array with this array's type and shape over `bytes`
    ///
    /// # Safety
    ///
    /// The returned array must not outlive `bytes`, and must not be written
    /// through unless `bytes` came from a mutable borrow.
    unsafe fn wrap_host_bytes(&self, bytes: *mut u8, len: usize) -> Result<Array> {
        let handle = MemoryHandle::from_ptr(bytes)
            .ok_or_else(|| Error::InvalidShape("null host buffer".to_string()))?;
        let options = ArrayOptions {
            space: Space::System,
            dtype: self.dtype(),
            native: self.is_native(),
            conjugated: self.is_conjugated(),
        };
        let parts = RawParts::new(handle, len, self.shape()).with_space(Space::System);
        Array::from_raw_parts(self.allocator(), parts, &options)
    }

    fn check_host_len(&self, len: usize) -> Result<()> {
        if len != self.nbytes() {
            return Err(Error::InvalidShape(format!(
                "{len} bytes supplied for a {}{:?} array of {} bytes",
                self.dtype(),
                self.shape(),
                self.nbytes()
            )));
        }
        Ok(())
    }

    fn synchronize_if_device(&self) -> Result<()> {
        if self.space().is_host_accessible() {
            Ok(())
        } else {
            self.synchronize()
        }
    }

    /// Copy the elements into `out` in row-major order
    pub(crate) fn read_bytes(&self, out: &mut [u8]) -> Result<()> {
        self.check_host_len(out.len())?;
        // SAFETY: the wrapper is dropped before `out` goes out of scope.
        let host = unsafe { self.wrap_host_bytes(out.as_mut_ptr(), out.len())? };
        transfer(&host, self)?;
        self.synchronize_if_device()
    }

    /// Overwrite the elements from row-major bytes
    #[tracing::instrument(level = "debug", skip_all, fields(dtype = %self.dtype(), shape = ?self.shape(), space = %self.space()))]
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_writeable()?;
        self.check_host_len(bytes.len())?;
        // SAFETY: the wrapper only serves as a transfer source and is dropped
        // before `bytes` goes out of scope.
        let mut host = unsafe { self.wrap_host_bytes(bytes.as_ptr() as *mut u8, bytes.len())? };
        host.set_writeable(false);
        transfer(self, &host)?;
        self.synchronize_if_device()
    }

    /// Copy into a fresh host array
    ///
    /// Waits for the transfer, so the result is ready to read.
    #[tracing::instrument(level = "debug", skip_all, fields(dtype = %self.dtype(), shape = ?self.shape(), space = %self.space()))]
    pub fn get(&self) -> Result<Array> {
        let out = self.copy(Some(Space::System))?;
        self.synchronize_if_device()?;
        Ok(out)
    }

    /// Copy into an existing array of identical type and shape
    #[tracing::instrument(level = "debug", skip_all, fields(src = %self.space(), dst = %dst.space()))]
    pub fn get_into(&self, dst: &mut Array) -> Result<()> {
        transfer(dst, self)
    }

    /// Overwrite from an array of identical type and shape
    #[tracing::instrument(level = "debug", skip_all, fields(src = %src.space(), dst = %self.space()))]
    pub fn set(&mut self, src: &Array) -> Result<()> {
        transfer(self, src)
    }

    /// Copy into a new owned array in `space` (default: this array's space)
    ///
    /// The copy is contiguous and never aliases `self`.
    #[tracing::instrument(level = "debug", skip_all, fields(dtype = %self.dtype(), shape = ?self.shape(), from = %self.space()))]
    pub fn copy(&self, space: Option<Space>) -> Result<Array> {
        let options = ArrayOptions {
            space: space.unwrap_or(self.space()),
            dtype: self.dtype(),
            native: self.is_native(),
            conjugated: self.is_conjugated(),
        };
        let mut out = Array::zeros(self.allocator(), self.shape(), &options)?;
        out.set(self)?;
        Ok(out)
    }

    /// Set every byte of every element to `value`
    #[tracing::instrument(level = "debug", skip_all, fields(value = value, space = %self.space()))]
    pub fn fill(&mut self, value: u8) -> Result<()> {
        self.ensure_writeable()?;
        if self.is_empty() {
            return Ok(());
        }

        let this: &Array = self;
        let plan = plan_copy(this, this)?;
        let space = self.space();
        let dst = self.data_handle();

        if space.is_host_accessible() {
            // SAFETY: the layout passed its bounds check at construction.
            unsafe {
                match plan {
                    CopyPlan::Flat { bytes } => ptr::write_bytes(dst.as_ptr(), value, bytes),
                    CopyPlan::Pitched {
                        width,
                        height,
                        dst_pitch,
                        ..
                    } => {
                        for row in 0..height {
                            ptr::write_bytes(dst.byte_add(row * dst_pitch).as_ptr(), value, width);
                        }
                    }
                }
            }
            return Ok(());
        }

        // SAFETY: as above.
        unsafe {
            match plan {
                CopyPlan::Flat { bytes } => self.allocator().fill(dst, space, value, bytes)?,
                CopyPlan::Pitched {
                    width,
                    height,
                    dst_pitch,
                    ..
                } => self
                    .allocator()
                    .fill_2d(Pitched::new(dst, dst_pitch), space, value, width, height)?,
            }
        }
        Ok(())
    }

    /// Reverse the byte order of every component and flip the byte order flag
    ///
    /// Complex values are swapped one component at a time. Components of one
    /// byte or less are left untouched. Only host-accessible arrays can be
    /// swapped.
    pub fn byteswap_in_place(&mut self) -> Result<()> {
        self.ensure_writeable()?;
        if !self.space().is_host_accessible() {
            return Err(Error::UnsupportedLayout(format!(
                "byteswap needs host-accessible memory, array is in {}",
                self.space()
            )));
        }

        let component = self.dtype().component_bytes();
        if component > 1 {
            let base = self.data_handle();
            let item = self.dtype().storage_bytes();
            layout::for_each_offset(&self.physical_shape(), self.strides(), |offset| {
                for start in (0..item).step_by(component) {
                    // SAFETY: offset + item stays within the array's extent.
                    let bytes = unsafe {
                        std::slice::from_raw_parts_mut(base.byte_add(offset + start).as_ptr(), component)
                    };
                    bytes.reverse();
                }
            });
        }

        self.set_native(!self.is_native());
        Ok(())
    }

    /// Byte-swapped owned copy
    pub fn byteswap(&self) -> Result<Array> {
        if !self.space().is_host_accessible() {
            return Err(Error::UnsupportedLayout(format!(
                "byteswap needs host-accessible memory, array is in {}",
                self.space()
            )));
        }
        let mut out = self.copy(None)?;
        out.byteswap_in_place()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DataType;
    use std::sync::Arc;
    use tessera_memory::{EmulatedAllocator, SharedAllocator, SystemAllocator};

    fn system() -> SharedAllocator {
        Arc::new(SystemAllocator::new())
    }

    fn iota_u8(alloc: &SharedAllocator, shape: &[usize]) -> Array {
        let n: usize = shape.iter().product();
        let data: Vec<u8> = (0..n).map(|i| i as u8).collect();
        Array::from_slice(alloc, shape, &data, &ArrayOptions::default()).unwrap()
    }

    #[test]
    fn test_plan_contiguous_is_flat() {
        let alloc = system();
        let a = iota_u8(&alloc, &[4, 6]);
        let b = a.copy(None).unwrap();
        assert_eq!(plan_copy(&b, &a).unwrap(), CopyPlan::Flat { bytes: 24 });
    }

    #[test]
    fn test_plan_narrowed_rows_is_pitched() {
        let alloc = system();
        let a = iota_u8(&alloc, &[4, 6]);
        let cols = a.narrow(1, 1, 3).unwrap();
        let dst = Array::zeros(&alloc, &[4, 3], &ArrayOptions::default().with_dtype(DataType::U8)).unwrap();
        assert_eq!(
            plan_copy(&dst, &cols).unwrap(),
            CopyPlan::Pitched {
                width: 3,
                height: 4,
                dst_pitch: 3,
                src_pitch: 6
            }
        );
    }

    #[test]
    fn test_plan_column_is_rank1_pitched() {
        let alloc = system();
        let a = iota_u8(&alloc, &[4, 6]);
        let col = a.select(1, 2).unwrap();
        let dst = Array::zeros(&alloc, &[4], &ArrayOptions::default().with_dtype(DataType::U8)).unwrap();
        assert_eq!(
            plan_copy(&dst, &col).unwrap(),
            CopyPlan::Pitched {
                width: 1,
                height: 4,
                dst_pitch: 1,
                src_pitch: 6
            }
        );
        let mut dst = dst;
        dst.set(&col).unwrap();
        assert_eq!(dst.to_vec::<u8>().unwrap(), vec![2, 8, 14, 20]);
    }

    #[test]
    fn test_transposed_matrix_is_unsupported() {
        let alloc = system();
        let a = iota_u8(&alloc, &[4, 6]);
        let t = a.transpose().unwrap();
        let err = t.copy(None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLayout(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_read_only_destination() {
        let alloc = system();
        let src = iota_u8(&alloc, &[8]);
        let mut dst = Array::zeros(&alloc, &[8], &ArrayOptions::default().with_dtype(DataType::U8)).unwrap();
        dst.set_writeable(false);
        assert!(matches!(dst.set(&src), Err(Error::ReadOnly)));
        assert!(matches!(dst.fill(1), Err(Error::ReadOnly)));
        assert!(matches!(dst.write_bytes(&[0; 8]), Err(Error::ReadOnly)));
        // reading from a read-only array is fine
        assert_eq!(dst.to_bytes().unwrap(), vec![0; 8]);
    }

    #[test]
    fn test_overlapping_views() {
        let alloc = system();
        let mut a = iota_u8(&alloc, &[8]);
        let tail = a.narrow(0, 2, 6).unwrap();
        let mut head = a.narrow(0, 0, 6).unwrap();
        head.set(&tail).unwrap();
        assert_eq!(a.to_vec::<u8>().unwrap(), vec![2, 3, 4, 5, 6, 7, 6, 7]);
        a.fill(0).unwrap();
        assert_eq!(a.to_bytes().unwrap(), vec![0; 8]);
    }

    #[test]
    fn test_overlapping_pitched_views_are_staged() {
        let alloc = system();
        let data: Vec<u8> = (0..16).collect();
        let a = Array::from_slice(&alloc, &[4, 4], &data, &ArrayOptions::default()).unwrap();

        // each destination row starts inside the previous source row
        let mut dst = a.narrow(0, 1, 3).unwrap().narrow(1, 0, 3).unwrap();
        let src = a.narrow(0, 0, 3).unwrap().narrow(1, 1, 3).unwrap();
        assert!(overlaps(&dst, &src));
        assert!(matches!(plan_copy(&dst, &src).unwrap(), CopyPlan::Pitched { .. }));

        dst.set(&src).unwrap();
        assert_eq!(
            a.to_vec::<u8>().unwrap(),
            vec![0, 1, 2, 3, 1, 2, 3, 7, 5, 6, 7, 11, 9, 10, 11, 15]
        );
    }

    #[test]
    fn test_disjoint_views_do_not_overlap() {
        let alloc = system();
        let a = iota_u8(&alloc, &[8]);
        let head = a.narrow(0, 0, 4).unwrap();
        let tail = a.narrow(0, 4, 4).unwrap();
        assert!(!overlaps(&head, &tail));
        assert!(overlaps(&head, &a));
        assert!(!overlaps(&a.narrow(0, 2, 0).unwrap(), &a));
    }

    #[test]
    fn test_fill_strided_region() {
        let alloc = system();
        let a = Array::zeros(&alloc, &[3, 4], &ArrayOptions::default().with_dtype(DataType::U8)).unwrap();
        let mut inner = a.narrow(1, 1, 2).unwrap();
        inner.fill(9).unwrap();
        assert_eq!(a.to_bytes().unwrap(), vec![0, 9, 9, 0, 0, 9, 9, 0, 0, 9, 9, 0]);
    }

    #[test]
    fn test_device_fill_uses_allocator() {
        let emu = Arc::new(EmulatedAllocator::new());
        let alloc: SharedAllocator = emu.clone();
        let opts = ArrayOptions::default().with_space(Space::Cuda).with_dtype(DataType::U8);
        let mut a = Array::zeros(&alloc, &[2, 4], &opts).unwrap();
        a.synchronize().unwrap();

        a.fill(7).unwrap();
        assert_eq!(emu.pending_transfers(), 1);
        a.synchronize().unwrap();
        assert_eq!(a.get().unwrap().to_bytes().unwrap(), vec![7; 8]);
    }

    #[test]
    fn test_byteswap_components() {
        let alloc = system();
        let a = Array::from_slice(&alloc, &[2], &[0x0102u16, 0x0304], &ArrayOptions::default()).unwrap();
        let swapped = a.byteswap().unwrap();
        assert!(!swapped.is_native());
        assert!(a.is_native());
        assert_eq!(swapped.to_vec::<u16>().unwrap(), vec![0x0201, 0x0403]);

        let c = Array::from_slice(
            &alloc,
            &[1],
            &[crate::ComplexInt::new(0x0102i16, 0x0304i16)],
            &ArrayOptions::default(),
        )
        .unwrap();
        let mut c = c;
        c.byteswap_in_place().unwrap();
        assert_eq!(c.to_vec::<crate::ComplexInt<i16>>().unwrap()[0], crate::ComplexInt::new(0x0201, 0x0403));
    }

    #[test]
    fn test_byteswap_single_byte_only_flips_flag() {
        let alloc = system();
        let mut a = iota_u8(&alloc, &[4]);
        a.byteswap_in_place().unwrap();
        assert!(!a.is_native());
        assert_eq!(a.to_vec::<u8>().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_byteswap_device_rejected() {
        let alloc: SharedAllocator = Arc::new(EmulatedAllocator::new());
        let opts = ArrayOptions::default().with_space(Space::Cuda);
        let mut a = Array::zeros(&alloc, &[4], &opts).unwrap();
        assert!(matches!(a.byteswap_in_place(), Err(Error::UnsupportedLayout(_))));
        assert!(matches!(a.byteswap(), Err(Error::UnsupportedLayout(_))));
    }
}
