//! Typed, space-aware multidimensional arrays
//!
//! An [`Array`] is a view over a [`Buffer`]: a byte offset, a logical shape,
//! physical byte strides, a [`DataType`] and a handful of flags. Arrays never
//! hold element values themselves; reading or writing bytes always goes
//! through the transfer engine so device memory is handled the same way as
//! host memory.
//!
//! # Packed types
//!
//! Types narrower than a byte keep their *logical* shape, while strides are
//! computed on the *physical* shape whose trailing dimension counts bytes:
//!
//! ```text
//! u4, shape (3, 16)   →   physical (3, 8), strides (8, 1)
//! ```
//!
//! Only the trailing dimension is packed, so views that would move, split or
//! remove it are rejected with [`Error::Packing`].
//!
//! # Ownership
//!
//! Fresh allocations and copies are [`Ownership::Owned`]. Views and wrapped
//! caller buffers are [`Ownership::Borrowed`]. Views of an owned array share
//! its allocation guard, so dropping the original never invalidates a view.

use crate::buffer::{Buffer, Ownership};
use crate::dtype::DataType;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::layout;
use crate::options::ArrayOptions;
use std::fmt;
use tessera_memory::{MemoryHandle, SharedAllocator, Space};

/// Caller memory to wrap with [`Array::from_raw_parts`]
#[derive(Debug, Clone)]
pub struct RawParts {
    pub handle: MemoryHandle,
    /// Bytes addressable from `handle`
    pub len: usize,
    /// Logical shape
    pub shape: Vec<usize>,
    /// Byte strides on the physical shape; row-major when absent
    pub strides: Option<Vec<usize>>,
    pub byte_offset: usize,
    /// Declared space; looked up with the allocator when absent
    pub space: Option<Space>,
}

impl RawParts {
    pub fn new(handle: MemoryHandle, len: usize, shape: &[usize]) -> Self {
        Self {
            handle,
            len,
            shape: shape.to_vec(),
            strides: None,
            byte_offset: 0,
            space: None,
        }
    }

    pub fn with_strides(mut self, strides: &[usize]) -> Self {
        self.strides = Some(strides.to_vec());
        self
    }

    pub fn with_byte_offset(mut self, byte_offset: usize) -> Self {
        self.byte_offset = byte_offset;
        self
    }

    pub fn with_space(mut self, space: Space) -> Self {
        self.space = Some(space);
        self
    }
}

/// Multidimensional array over memory in some space
///
/// # Sharing
///
/// Views ([`narrow`](Array::narrow), [`select`](Array::select) and the
/// other `&self` constructors) share the parent's bytes, and a view of a
/// writeable array is itself writeable. `&mut` on one view therefore does
/// not exclude writes through another, and `Array` is `Send + Sync`, so
/// views handed to different threads may touch the same bytes at once.
/// Transfers and fills do not lock: writes to overlapping regions from
/// several threads, or a read racing a write, leave the contents
/// unspecified. Ordering such accesses is up to the caller, for example by
/// giving each thread a disjoint view or by clearing
/// [`set_writeable`](Array::set_writeable) on views that should only be
/// read.
pub struct Array {
    buffer: Buffer,
    byte_offset: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
    dtype: DataType,
    native: bool,
    conjugated: bool,
    writeable: bool,
    ownership: Ownership,
}

impl Array {
    /// Allocate a zero-filled array
    ///
    /// The allocation covers exactly the row-major physical layout. Packed
    /// types need at least one dimension, with a trailing dimension that is a
    /// multiple of the packing factor.
    pub fn zeros(allocator: &SharedAllocator, shape: &[usize], options: &ArrayOptions) -> Result<Self> {
        let dtype = options.dtype;
        let physical = layout::physical_shape(dtype, shape)?;
        let (strides, nbytes) = layout::row_major_strides(&physical, dtype.storage_bytes())
            .ok_or_else(|| Error::InvalidShape(format!("{dtype}{shape:?} is larger than the address space")))?;

        let buffer = Buffer::zeroed(allocator, options.space, nbytes)?;

        Ok(Self {
            buffer,
            byte_offset: 0,
            shape: shape.to_vec(),
            strides,
            dtype,
            native: options.native,
            conjugated: options.conjugated,
            writeable: true,
            ownership: Ownership::Owned,
        })
    }

    /// Allocate an array in `options.space` and fill it from host data
    ///
    /// The data type is taken from `T`; `options.dtype` is ignored.
    pub fn from_slice<T>(allocator: &SharedAllocator, shape: &[usize], data: &[T], options: &ArrayOptions) -> Result<Self>
    where
        T: Element + bytemuck::Pod,
    {
        let dtype = DataType::of::<T>()?;
        if layout::element_count(shape) != Some(data.len()) {
            return Err(Error::InvalidShape(format!(
                "{} elements supplied for shape {:?}",
                data.len(),
                shape
            )));
        }

        let mut array = Self::zeros(allocator, shape, &options.with_dtype(dtype))?;
        array.write_bytes(bytemuck::cast_slice(data))?;
        Ok(array)
    }

    /// Wrap memory the caller owns
    ///
    /// The result is [`Ownership::Borrowed`] and never releases the memory.
    /// When `parts.space` is absent the space is looked up with
    /// [`SpaceAllocator::space_of`](tessera_memory::SpaceAllocator::space_of).
    ///
    /// # Safety
    ///
    /// `parts.handle` must point at `parts.len` bytes in the array's space
    /// that stay valid, and are not freed, for as long as the returned array
    /// or any view of it is alive.
    pub unsafe fn from_raw_parts(allocator: &SharedAllocator, parts: RawParts, options: &ArrayOptions) -> Result<Self> {
        let dtype = options.dtype;
        let physical = layout::physical_shape(dtype, &parts.shape)?;
        let itemsize = dtype.storage_bytes();
        let strides = match parts.strides {
            Some(strides) if strides.len() != parts.shape.len() => {
                return Err(Error::InvalidShape(format!(
                    "{} strides for {} dimensions",
                    strides.len(),
                    parts.shape.len()
                )))
            }
            Some(strides) => strides,
            None => layout::row_major_strides(&physical, itemsize)
                .map(|(strides, _)| strides)
                .ok_or_else(|| Error::InvalidShape(format!("shape {:?} is larger than the address space", parts.shape)))?,
        };

        let extent = layout::max_extent(&physical, &strides, itemsize)
            .ok_or_else(|| Error::InvalidShape(format!("strides {strides:?} reach past the address space")))?;
        if parts.byte_offset.checked_add(extent).map_or(true, |end| end > parts.len) {
            return Err(Error::InvalidShape(format!(
                "layout needs {} bytes at offset {}, buffer has {}",
                extent, parts.byte_offset, parts.len
            )));
        }

        let space = match parts.space {
            Some(space) => space,
            None => allocator.space_of(parts.handle)?,
        };

        Ok(Self {
            buffer: Buffer::from_raw(allocator, parts.handle, parts.len, space),
            byte_offset: parts.byte_offset,
            shape: parts.shape,
            strides,
            dtype,
            native: options.native,
            conjugated: options.conjugated,
            writeable: true,
            ownership: Ownership::Borrowed,
        })
    }

    /// Borrowed view of `self` with a new layout
    fn derive(&self, byte_offset: usize, shape: Vec<usize>, strides: Vec<usize>) -> Self {
        Self {
            buffer: self.buffer.clone(),
            byte_offset,
            shape,
            strides,
            dtype: self.dtype,
            native: self.native,
            conjugated: self.conjugated,
            writeable: self.writeable,
            ownership: Ownership::Borrowed,
        }
    }

    /// Logical shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Shape in storage units: the trailing dimension of packed types counts bytes
    pub fn physical_shape(&self) -> Vec<usize> {
        match (self.dtype.packing_factor(), self.shape.split_last()) {
            (Some(factor), Some((&last, outer))) => {
                let mut physical = outer.to_vec();
                physical.push(last / factor);
                physical
            }
            _ => self.shape.clone(),
        }
    }

    /// Byte strides over the physical shape
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes covered by the elements themselves, ignoring stride gaps
    pub fn nbytes(&self) -> usize {
        self.physical_shape().iter().product::<usize>() * self.dtype.storage_bytes()
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn space(&self) -> Space {
        self.buffer.space()
    }

    /// Stored in host byte order
    pub fn is_native(&self) -> bool {
        self.native
    }

    pub fn is_conjugated(&self) -> bool {
        self.conjugated
    }

    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn allocator(&self) -> &SharedAllocator {
        self.buffer.allocator()
    }

    /// Address of the first element
    pub fn data_handle(&self) -> MemoryHandle {
        self.buffer.handle().byte_add(self.byte_offset)
    }

    /// Whether the elements occupy one gap-free row-major byte range
    pub fn is_contiguous(&self) -> bool {
        self.ndim() == 0 || layout::is_row_major(&self.physical_shape(), &self.strides, self.dtype.storage_bytes())
    }

    pub fn set_writeable(&mut self, writeable: bool) {
        self.writeable = writeable;
    }

    pub(crate) fn ensure_writeable(&self) -> Result<()> {
        if self.writeable {
            Ok(())
        } else {
            Err(Error::ReadOnly)
        }
    }

    pub(crate) fn set_native(&mut self, native: bool) {
        self.native = native;
    }

    /// Reinterpret the bytes as another type without copying
    ///
    /// The trailing axis must be byte-contiguous and its byte length must
    /// divide evenly into items of the new type. Rank-0 arrays only accept
    /// types of the same size.
    pub fn view(&self, dtype: DataType) -> Result<Self> {
        if self.ndim() == 0 {
            if dtype.is_packed() || dtype.itemsize_bits() != self.dtype.itemsize_bits() {
                return Err(Error::InvalidView(format!(
                    "cannot view a scalar {} as {}",
                    self.dtype, dtype
                )));
            }
            let mut view = self.derive(self.byte_offset, Vec::new(), Vec::new());
            view.dtype = dtype;
            return Ok(view);
        }

        let old_item = self.dtype.storage_bytes();
        let physical = self.physical_shape();
        let last = physical.len() - 1;
        if physical[last] > 1 && self.strides[last] != old_item {
            return Err(Error::InvalidView(format!(
                "trailing axis has stride {} but items are {} bytes",
                self.strides[last], old_item
            )));
        }

        let row_bytes = physical[last] * old_item;
        let new_item = dtype.storage_bytes();
        if row_bytes % new_item != 0 {
            return Err(Error::InvalidView(format!(
                "trailing axis of {row_bytes} bytes does not divide into {dtype} items"
            )));
        }

        let mut shape = self.shape.clone();
        shape[last] = (row_bytes / new_item)
            .checked_mul(dtype.packing_factor().unwrap_or(1))
            .ok_or_else(|| Error::InvalidView(format!("{row_bytes} bytes hold too many {dtype} items")))?;
        let mut strides = self.strides.clone();
        strides[last] = new_item;

        let mut view = self.derive(self.byte_offset, shape, strides);
        view.dtype = dtype;
        tracing::trace!(from = %self.dtype, to = %dtype, "array_view");
        Ok(view)
    }

    /// Borrowed view with the conjugation flag flipped
    pub fn conj(&self) -> Self {
        let mut view = self.derive(self.byte_offset, self.shape.clone(), self.strides.clone());
        view.conjugated = !self.conjugated;
        view
    }

    fn check_axis(&self, op: &str, axis: usize) -> Result<()> {
        if axis >= self.ndim() {
            return Err(Error::InvalidView(format!(
                "{op} axis {axis} out of range for {}D array",
                self.ndim()
            )));
        }
        if self.dtype.is_packed() && axis + 1 == self.ndim() {
            return Err(Error::Packing(format!(
                "{op} cannot touch the packed trailing axis of a {} array",
                self.dtype
            )));
        }
        Ok(())
    }

    /// Reorder axes
    pub fn permute(&self, axes: &[usize]) -> Result<Self> {
        let ndim = self.ndim();
        if axes.len() != ndim {
            return Err(Error::InvalidView(format!(
                "permute expects {ndim} axes, got {}",
                axes.len()
            )));
        }

        let mut seen = vec![false; ndim];
        for &axis in axes {
            if axis >= ndim || seen[axis] {
                return Err(Error::InvalidView(format!("invalid permutation {axes:?}")));
            }
            seen[axis] = true;
        }
        if self.dtype.is_packed() && axes[ndim - 1] != ndim - 1 {
            return Err(Error::Packing(format!(
                "permutation {axes:?} moves the packed trailing axis"
            )));
        }

        let shape = axes.iter().map(|&a| self.shape[a]).collect();
        let strides = axes.iter().map(|&a| self.strides[a]).collect();
        tracing::trace!(?axes, "array_permute");
        Ok(self.derive(self.byte_offset, shape, strides))
    }

    /// Swap the two axes of a matrix
    pub fn transpose(&self) -> Result<Self> {
        if self.ndim() != 2 {
            return Err(Error::InvalidView(format!(
                "transpose requires a 2D array, got {}D",
                self.ndim()
            )));
        }
        self.permute(&[1, 0])
    }

    /// Restrict `axis` to `start..start + len`
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Self> {
        self.check_axis("narrow", axis)?;
        let size = self.shape[axis];
        if start.checked_add(len).map_or(true, |end| end > size) {
            return Err(Error::InvalidView(format!(
                "narrow of {len} elements from {start} out of bounds for axis {axis} of size {size}"
            )));
        }

        let mut shape = self.shape.clone();
        shape[axis] = len;
        // start < size here, so the offset stays inside the current extent
        let offset = if len == 0 {
            self.byte_offset
        } else {
            self.byte_offset + start * self.strides[axis]
        };
        Ok(self.derive(offset, shape, self.strides.clone()))
    }

    /// Take every `step`-th index of `axis` in `start..end`
    ///
    /// `end` is clamped to the axis length.
    pub fn slice(&self, axis: usize, start: usize, end: usize, step: usize) -> Result<Self> {
        self.check_axis("slice", axis)?;
        if step == 0 {
            return Err(Error::InvalidView("slice step cannot be zero".to_string()));
        }
        let size = self.shape[axis];
        if start > size {
            return Err(Error::InvalidView(format!(
                "slice start {start} out of range for axis {axis} of size {size}"
            )));
        }

        let end = end.min(size);
        let len = if end > start { (end - start).div_ceil(step) } else { 0 };

        let mut shape = self.shape.clone();
        shape[axis] = len;
        let mut strides = self.strides.clone();
        // a single item never advances along the axis
        if len > 1 {
            strides[axis] = strides[axis]
                .checked_mul(step)
                .ok_or_else(|| Error::InvalidView(format!("slice step {step} overflows the stride of axis {axis}")))?;
        }
        // an empty slice keeps the original offset so it never points past the buffer
        let offset = if len == 0 {
            self.byte_offset
        } else {
            self.byte_offset + start * self.strides[axis]
        };
        Ok(self.derive(offset, shape, strides))
    }

    /// Fix `axis` at `index`, dropping it
    pub fn select(&self, axis: usize, index: usize) -> Result<Self> {
        self.check_axis("select", axis)?;
        if index >= self.shape[axis] {
            return Err(Error::InvalidView(format!(
                "select index {index} out of range for axis {axis} of size {}",
                self.shape[axis]
            )));
        }

        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.remove(axis);
        let stride = strides.remove(axis);
        Ok(self.derive(self.byte_offset + index * stride, shape, strides))
    }

    /// Copy the elements out as `T`
    ///
    /// `T` must reflect to exactly this array's data type.
    pub fn to_vec<T>(&self) -> Result<Vec<T>>
    where
        T: Element + bytemuck::Pod,
    {
        let expected = DataType::of::<T>()?;
        if expected != self.dtype {
            return Err(Error::TypeMismatch {
                expected: self.dtype,
                actual: expected,
            });
        }

        let mut out = vec![T::zeroed(); self.len()];
        self.read_bytes(bytemuck::cast_slice_mut(&mut out))?;
        Ok(out)
    }

    /// Copy the elements out as row-major bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.nbytes()];
        self.read_bytes(&mut out)?;
        Ok(out)
    }

    /// Wait for outstanding device transfers issued by this array's allocator
    pub fn synchronize(&self) -> Result<()> {
        Ok(self.allocator().synchronize()?)
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("strides", &self.strides)
            .field("byte_offset", &self.byte_offset)
            .field("space", &self.space())
            .field("native", &self.native)
            .field("conjugated", &self.conjugated)
            .field("writeable", &self.writeable)
            .field("ownership", &self.ownership)
            .finish()
    }
}
