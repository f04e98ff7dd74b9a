//! Shape and stride arithmetic on physical layouts
//!
//! Everything here works on *physical* shapes (packed trailing dimension
//! already folded into bytes) and byte strides.

use crate::dtype::DataType;
use crate::error::{Error, Result};

/// Fold the trailing dimension of a packed type into whole bytes
pub(crate) fn physical_shape(dtype: DataType, shape: &[usize]) -> Result<Vec<usize>> {
    let Some(factor) = dtype.packing_factor() else {
        return Ok(shape.to_vec());
    };

    let Some((&last, _)) = shape.split_last() else {
        return Err(Error::Packing(format!("{dtype} requires at least one dimension")));
    };
    if last % factor != 0 {
        return Err(Error::Packing(format!(
            "trailing dimension {last} of {dtype} is not a multiple of {factor}"
        )));
    }

    let mut physical = shape.to_vec();
    let rank = physical.len();
    physical[rank - 1] = last / factor;
    Ok(physical)
}

/// Product of `shape`, or `None` on overflow
pub(crate) fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))
}

/// Row-major byte strides and the total byte size they cover
///
/// `None` when the size does not fit in `usize`.
pub(crate) fn row_major_strides(shape: &[usize], itemsize: usize) -> Option<(Vec<usize>, usize)> {
    let mut strides = vec![0; shape.len()];
    let mut next = itemsize;
    for (stride, &len) in strides.iter_mut().zip(shape).rev() {
        *stride = next;
        next = next.checked_mul(len)?;
    }
    Some((strides, next))
}

/// Bytes from the first to one past the last addressed byte
///
/// `None` when the extent does not fit in `usize`.
pub(crate) fn max_extent(shape: &[usize], strides: &[usize], itemsize: usize) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .zip(strides)
        .try_fold(itemsize, |acc, (&len, &stride)| acc.checked_add((len - 1).checked_mul(stride)?))
}

/// Whether `strides` are the row-major strides of `shape`
///
/// Unit dimensions can carry any stride. Empty layouts count as contiguous.
pub(crate) fn is_row_major(shape: &[usize], strides: &[usize], itemsize: usize) -> bool {
    if shape.contains(&0) {
        return true;
    }
    let mut expected = itemsize;
    for (&len, &stride) in shape.iter().zip(strides).rev() {
        if len != 1 && stride != expected {
            return false;
        }
        expected *= len;
    }
    true
}

/// Physical layout reduced for copying
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Squeezed {
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

/// Drop unit axes and merge adjacent axes whose strides chain
///
/// Axis `i` merges into `i + 1` when `strides[i] == strides[i + 1] * shape[i + 1]`.
/// The result has rank at least one.
pub(crate) fn squeeze(shape: &[usize], strides: &[usize], itemsize: usize) -> Squeezed {
    let mut out_shape: Vec<usize> = Vec::with_capacity(shape.len());
    let mut out_strides: Vec<usize> = Vec::with_capacity(shape.len());

    // Walk from the innermost axis outwards so merges see the merged tail.
    for (&len, &stride) in shape.iter().zip(strides).rev() {
        if len == 1 {
            continue;
        }
        match (out_shape.last_mut(), out_strides.last()) {
            (Some(inner_len), Some(&inner_stride)) if stride == inner_stride * *inner_len => {
                *inner_len *= len;
            }
            _ => {
                out_shape.push(len);
                out_strides.push(stride);
            }
        }
    }

    if out_shape.is_empty() {
        out_shape.push(1);
        out_strides.push(itemsize);
    }
    out_shape.reverse();
    out_strides.reverse();

    Squeezed {
        shape: out_shape,
        strides: out_strides,
    }
}

/// Call `f` with the byte offset of every item, in row-major order
pub(crate) fn for_each_offset(shape: &[usize], strides: &[usize], mut f: impl FnMut(usize)) {
    if shape.contains(&0) {
        return;
    }
    let mut index = vec![0usize; shape.len()];
    loop {
        f(index.iter().zip(strides).map(|(&i, &s)| i * s).sum());

        // odometer increment
        let mut axis = shape.len();
        loop {
            if axis == 0 {
                return;
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
}
