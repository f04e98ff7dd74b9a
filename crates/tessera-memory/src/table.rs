//! Bookkeeping for live host-backed allocations

use crate::error::{MemoryError, Result};
use crate::handle::MemoryHandle;
use crate::space::Space;
use std::alloc::{self, Layout};
use std::collections::BTreeMap;

/// Alignment of every host-backed allocation (one cache line)
pub const ALLOCATION_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy)]
struct Record {
    len: usize,
    layout: Layout,
    space: Space,
}

/// Live allocations keyed by base address
///
/// Kept ordered so an interior address can be resolved to the allocation
/// containing it with a single range query.
#[derive(Debug, Default)]
pub(crate) struct AllocationTable {
    records: BTreeMap<usize, Record>,
    bytes_in_use: usize,
}

impl AllocationTable {
    /// Allocate zeroed, aligned host memory and record it under `space`
    pub fn allocate(&mut self, space: Space, bytes: usize) -> Result<MemoryHandle> {
        // Zero-byte arrays still get a distinct address.
        let layout = Layout::from_size_align(bytes.max(1), ALLOCATION_ALIGN)
            .map_err(|_| MemoryError::out_of_memory(space, bytes, 0))?;

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let handle = MemoryHandle::from_ptr(ptr).ok_or_else(|| MemoryError::out_of_memory(space, bytes, 0))?;

        self.records.insert(
            handle.addr(),
            Record {
                len: bytes,
                layout,
                space,
            },
        );
        self.bytes_in_use += bytes;
        Ok(handle)
    }

    /// Free the allocation based at `handle`
    ///
    /// # Safety
    ///
    /// Nothing may access the allocation after this returns.
    pub unsafe fn release(&mut self, handle: MemoryHandle, space: Space) -> Result<()> {
        let record = self
            .records
            .get(&handle.addr())
            .copied()
            .ok_or(MemoryError::InvalidHandle(handle.addr()))?;

        if record.space != space {
            return Err(MemoryError::SpaceMismatch {
                handle: handle.addr(),
                expected: space,
                actual: record.space,
            });
        }

        self.records.remove(&handle.addr());
        self.bytes_in_use -= record.len;
        alloc::dealloc(handle.as_ptr(), record.layout);
        Ok(())
    }

    /// Space of the allocation containing `addr`, if any
    pub fn lookup(&self, addr: usize) -> Option<Space> {
        let (&base, record) = self.records.range(..=addr).next_back()?;
        let end = base + record.len.max(1);
        (addr < end).then_some(record.space)
    }

    pub fn live_allocations(&self) -> usize {
        self.records.len()
    }

    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }

    /// Free everything still recorded
    pub fn clear(&mut self) {
        let records = std::mem::take(&mut self.records);
        for (addr, record) in records {
            // SAFETY: addr came from alloc_zeroed with exactly this layout and
            // has not been freed, since release removes it from the table.
            unsafe { alloc::dealloc(addr as *mut u8, record.layout) };
        }
        self.bytes_in_use = 0;
    }
}

impl Drop for AllocationTable {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            tracing::warn!(
                leaked = self.records.len(),
                bytes = self.bytes_in_use,
                "allocator dropped with live allocations"
            );
        }
        self.clear();
    }
}

/// Host memory primitives shared by the host-backed allocators
///
/// # Safety
///
/// Every function requires the handles to point at host memory valid for the
/// full range touched, with source and destination not overlapping.
pub(crate) mod host {
    use crate::handle::{MemoryHandle, Pitched};
    use std::ptr;

    pub unsafe fn fill(dst: MemoryHandle, value: u8, bytes: usize) {
        ptr::write_bytes(dst.as_ptr(), value, bytes);
    }

    pub unsafe fn fill_2d(dst: Pitched, value: u8, width: usize, height: usize) {
        for row in 0..height {
            ptr::write_bytes(dst.handle.byte_add(row * dst.pitch).as_ptr(), value, width);
        }
    }

    pub unsafe fn copy_flat(dst: MemoryHandle, src: MemoryHandle, bytes: usize) {
        ptr::copy_nonoverlapping(src.as_ptr() as *const u8, dst.as_ptr(), bytes);
    }

    pub unsafe fn copy_2d(dst: Pitched, src: Pitched, width: usize, height: usize) {
        for row in 0..height {
            let s = src.handle.byte_add(row * src.pitch);
            let d = dst.handle.byte_add(row * dst.pitch);
            ptr::copy_nonoverlapping(s.as_ptr() as *const u8, d.as_ptr(), width);
        }
    }
}
