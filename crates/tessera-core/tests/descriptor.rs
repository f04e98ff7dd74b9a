//! Integration tests for native descriptor export

use std::sync::Arc;
use tessera_abi::{dtype_code, space_code, ArrayDescriptor, KernelFn, MAX_DIMS};
use tessera_core::prelude::*;
use tessera_memory::{EmulatedAllocator, SharedAllocator, Space};

fn alloc() -> SharedAllocator {
    Arc::new(EmulatedAllocator::new())
}

/// Doubles every `i32` of a rank-1 input into a rank-1 output
unsafe extern "C" fn double_i32(input: *const ArrayDescriptor, output: *const ArrayDescriptor) -> i32 {
    let (input, output) = (&*input, &*output);
    if input.dtype != dtype_code::I32 || output.dtype != dtype_code::I32 || output.immutable != 0 {
        return 1;
    }
    if input.ndim != 1 || input.dims() != output.dims() {
        return 2;
    }
    for i in 0..input.shape[0] {
        let src = (input.data as *const u8).offset((i * input.strides[0]) as isize) as *const i32;
        let dst = (output.data as *mut u8).offset((i * output.strides[0]) as isize) as *mut i32;
        *dst = 2 * *src;
    }
    0
}

#[test]
fn test_scalar_exports_as_single_element() -> tessera_core::Result<()> {
    let a = Array::zeros(&alloc(), &[], &ArrayOptions::new().with_dtype(DataType::F64))?;
    let desc = a.to_descriptor()?;
    assert_eq!(desc.ndim, 1);
    assert_eq!(desc.dims(), &[1]);
    assert_eq!(desc.byte_strides(), &[8]);
    assert_eq!(desc.dtype, dtype_code::F64);
    Ok(())
}

#[test]
fn test_packed_exports_logical_shape() -> tessera_core::Result<()> {
    let opts = ArrayOptions::new().with_dtype(DataType::U4).with_space(Space::CudaHost);
    let a = Array::zeros(&alloc(), &[3, 16], &opts)?;
    let desc = a.to_descriptor()?;
    assert_eq!(desc.dims(), &[3, 16]);
    assert_eq!(desc.byte_strides(), &[8, 1]);
    assert_eq!(desc.dtype, dtype_code::U4);
    assert_eq!(desc.space, space_code::CUDA_HOST);
    Ok(())
}

#[test]
fn test_rank_limit() -> tessera_core::Result<()> {
    let at_limit = Array::zeros(&alloc(), &[1; MAX_DIMS], &ArrayOptions::new())?;
    assert_eq!(at_limit.to_descriptor()?.dims().len(), MAX_DIMS);

    let too_deep = Array::zeros(&alloc(), &[1; MAX_DIMS + 1], &ArrayOptions::new())?;
    match too_deep.to_descriptor() {
        Err(Error::RankTooLarge { rank, max }) => {
            assert_eq!(rank, MAX_DIMS + 1);
            assert_eq!(max, MAX_DIMS);
        }
        other => panic!("expected RankTooLarge, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_kernel_reads_strided_view() -> tessera_core::Result<()> {
    let alloc = alloc();
    let data: Vec<i32> = (0..12).collect();
    let matrix = Array::from_slice(&alloc, &[3, 4], &data, &ArrayOptions::new())?;
    let column = matrix.select(1, 3)?;
    let out = Array::zeros(&alloc, &[3], &ArrayOptions::new().with_dtype(DataType::I32))?;

    let (input, output) = (column.to_descriptor()?, out.to_descriptor()?);
    assert_eq!(input.byte_strides(), &[16]);

    let kernel: KernelFn = double_i32;
    // SAFETY: both descriptors point at live host memory owned by `matrix` and `out`.
    let status = unsafe { kernel(&input, &output) };
    assert_eq!(status, 0);
    assert_eq!(out.to_vec::<i32>()?, vec![6, 14, 22]);
    Ok(())
}

#[test]
fn test_read_only_flag_reaches_kernel() -> tessera_core::Result<()> {
    let alloc = alloc();
    let input = Array::from_slice(&alloc, &[2], &[1i32, 2], &ArrayOptions::new())?;
    let mut out = Array::zeros(&alloc, &[2], &ArrayOptions::new().with_dtype(DataType::I32))?;
    out.set_writeable(false);

    let (i, o) = (input.to_descriptor()?, out.to_descriptor()?);
    assert_eq!(o.immutable, 1);
    // SAFETY: as above; the kernel bails out before touching memory.
    assert_eq!(unsafe { double_i32(&i, &o) }, 1);
    assert_eq!(out.to_vec::<i32>()?, vec![0, 0]);
    Ok(())
}
