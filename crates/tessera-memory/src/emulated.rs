//! Multi-space allocator backed entirely by host RAM
//!
//! Stands in for an accelerator driver on machines without one. Every space
//! is served from ordinary heap memory, but each allocation remembers the
//! space it was requested in, so space lookups, accessibility checks and
//! release bookkeeping behave exactly as they would against a real device.

use crate::allocator::SpaceAllocator;
use crate::error::{MemoryError, Result};
use crate::handle::{MemoryHandle, Pitched};
use crate::space::Space;
use crate::table::{host, AllocationTable};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Host-backed allocator serving all spaces
#[derive(Debug, Default)]
pub struct EmulatedAllocator {
    table: Mutex<AllocationTable>,
    capacity: Option<usize>,
    pending_transfers: AtomicUsize,
}

impl EmulatedAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total number of live bytes across all spaces
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            capacity: Some(bytes),
            ..Self::default()
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn live_allocations(&self) -> usize {
        self.table.lock().live_allocations()
    }

    pub fn bytes_in_use(&self) -> usize {
        self.table.lock().bytes_in_use()
    }

    /// Device-side transfers issued since the last [`SpaceAllocator::synchronize`]
    pub fn pending_transfers(&self) -> usize {
        self.pending_transfers.load(Ordering::Acquire)
    }

    fn note_transfer(&self, dst_space: Space, src_space: Space) {
        if !(dst_space.is_host_accessible() && src_space.is_host_accessible()) {
            self.pending_transfers.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl SpaceAllocator for EmulatedAllocator {
    fn allocate(&self, space: Space, bytes: usize) -> Result<MemoryHandle> {
        let mut table = self.table.lock();

        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(table.bytes_in_use());
            if bytes > available {
                return Err(MemoryError::out_of_memory(space, bytes, available));
            }
        }

        let handle = table.allocate(space, bytes)?;
        tracing::trace!(%handle, %space, bytes, "emulated_allocate");
        Ok(handle)
    }

    unsafe fn release(&self, handle: MemoryHandle, space: Space) -> Result<()> {
        self.table.lock().release(handle, space)?;
        tracing::trace!(%handle, %space, "emulated_release");
        Ok(())
    }

    unsafe fn fill(&self, dst: MemoryHandle, space: Space, value: u8, bytes: usize) -> Result<()> {
        host::fill(dst, value, bytes);
        self.note_transfer(space, space);
        Ok(())
    }

    unsafe fn fill_2d(&self, dst: Pitched, space: Space, value: u8, width: usize, height: usize) -> Result<()> {
        host::fill_2d(dst, value, width, height);
        self.note_transfer(space, space);
        Ok(())
    }

    unsafe fn copy_flat(
        &self,
        dst: MemoryHandle,
        dst_space: Space,
        src: MemoryHandle,
        src_space: Space,
        bytes: usize,
    ) -> Result<()> {
        host::copy_flat(dst, src, bytes);
        self.note_transfer(dst_space, src_space);
        Ok(())
    }

    unsafe fn copy_2d(
        &self,
        dst: Pitched,
        dst_space: Space,
        src: Pitched,
        src_space: Space,
        width: usize,
        height: usize,
    ) -> Result<()> {
        host::copy_2d(dst, src, width, height);
        self.note_transfer(dst_space, src_space);
        Ok(())
    }

    fn space_of(&self, handle: MemoryHandle) -> Result<Space> {
        self.table
            .lock()
            .lookup(handle.addr())
            .ok_or(MemoryError::InvalidHandle(handle.addr()))
    }

    fn synchronize(&self) -> Result<()> {
        let drained = self.pending_transfers.swap(0, Ordering::AcqRel);
        if drained > 0 {
            tracing::trace!(drained, "emulated_synchronize");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_remember_space() {
        let alloc = EmulatedAllocator::new();
        let dev = alloc.allocate(Space::Cuda, 64).unwrap();
        let pinned = alloc.allocate(Space::CudaHost, 64).unwrap();

        assert_eq!(alloc.space_of(dev).unwrap(), Space::Cuda);
        assert_eq!(alloc.space_of(dev.byte_add(10)).unwrap(), Space::Cuda);
        assert_eq!(alloc.space_of(pinned).unwrap(), Space::CudaHost);

        unsafe {
            alloc.release(dev, Space::Cuda).unwrap();
            alloc.release(pinned, Space::CudaHost).unwrap();
        }
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn test_unknown_address() {
        let alloc = EmulatedAllocator::new();
        let mut local = 0u8;
        let handle = MemoryHandle::from_ptr(&mut local).unwrap();
        assert_eq!(alloc.space_of(handle).unwrap_err(), MemoryError::InvalidHandle(handle.addr()));
    }

    #[test]
    fn test_capacity_limit() {
        let alloc = EmulatedAllocator::with_capacity(100);
        let a = alloc.allocate(Space::Cuda, 60).unwrap();
        let err = alloc.allocate(Space::Cuda, 60).unwrap_err();
        assert_eq!(err, MemoryError::out_of_memory(Space::Cuda, 60, 40));

        unsafe { alloc.release(a, Space::Cuda).unwrap() };
        let b = alloc.allocate(Space::Cuda, 100).unwrap();
        unsafe { alloc.release(b, Space::Cuda).unwrap() };
    }

    #[test]
    fn test_device_copies_pending_until_synchronize() {
        let alloc = EmulatedAllocator::new();
        let host_buf = alloc.allocate(Space::System, 16).unwrap();
        let dev_buf = alloc.allocate(Space::Cuda, 16).unwrap();

        unsafe {
            alloc.copy_flat(dev_buf, Space::Cuda, host_buf, Space::System, 16).unwrap();
            alloc.copy_flat(host_buf, Space::System, host_buf.byte_add(8), Space::System, 8).unwrap();
        }
        assert_eq!(alloc.pending_transfers(), 1);

        alloc.synchronize().unwrap();
        assert_eq!(alloc.pending_transfers(), 0);

        unsafe {
            alloc.release(host_buf, Space::System).unwrap();
            alloc.release(dev_buf, Space::Cuda).unwrap();
        }
    }
}
