//! Allocator for pageable host memory

use crate::allocator::SpaceAllocator;
use crate::error::{MemoryError, Result};
use crate::handle::{MemoryHandle, Pitched};
use crate::space::Space;
use crate::table::{host, AllocationTable};
use parking_lot::Mutex;

/// Host RAM allocator serving [`Space::System`] only
///
/// Allocations are zeroed and cache-line aligned. Every address that is not
/// one of ours is still plain host memory, so [`SpaceAllocator::space_of`]
/// answers `System` for foreign pointers too.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    table: Mutex<AllocationTable>,
}

impl SystemAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of allocations not yet released
    pub fn live_allocations(&self) -> usize {
        self.table.lock().live_allocations()
    }

    /// Total bytes held by live allocations
    pub fn bytes_in_use(&self) -> usize {
        self.table.lock().bytes_in_use()
    }

    fn check(space: Space) -> Result<()> {
        match space {
            Space::System => Ok(()),
            other => Err(MemoryError::UnsupportedSpace(other)),
        }
    }
}

impl SpaceAllocator for SystemAllocator {
    fn allocate(&self, space: Space, bytes: usize) -> Result<MemoryHandle> {
        Self::check(space)?;
        let handle = self.table.lock().allocate(space, bytes)?;
        tracing::trace!(%handle, bytes, "system_allocate");
        Ok(handle)
    }

    unsafe fn release(&self, handle: MemoryHandle, space: Space) -> Result<()> {
        Self::check(space)?;
        self.table.lock().release(handle, space)?;
        tracing::trace!(%handle, "system_release");
        Ok(())
    }

    unsafe fn fill(&self, dst: MemoryHandle, space: Space, value: u8, bytes: usize) -> Result<()> {
        Self::check(space)?;
        host::fill(dst, value, bytes);
        Ok(())
    }

    unsafe fn fill_2d(&self, dst: Pitched, space: Space, value: u8, width: usize, height: usize) -> Result<()> {
        Self::check(space)?;
        host::fill_2d(dst, value, width, height);
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
        Self::check(dst_space)?;
        Self::check(src_space)?;
        host::copy_flat(dst, src, bytes);
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
        Self::check(dst_space)?;
        Self::check(src_space)?;
        host::copy_2d(dst, src, width, height);
        Ok(())
    }

    fn space_of(&self, _handle: MemoryHandle) -> Result<Space> {
        Ok(Space::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_release() {
        let alloc = SystemAllocator::new();
        let handle = alloc.allocate(Space::System, 256).unwrap();
        assert_eq!(alloc.live_allocations(), 1);
        assert_eq!(alloc.bytes_in_use(), 256);
        unsafe { alloc.release(handle, Space::System).unwrap() };
        assert_eq!(alloc.live_allocations(), 0);
    }

    #[test]
    fn test_rejects_device_space() {
        let alloc = SystemAllocator::new();
        let err = alloc.allocate(Space::Cuda, 16).unwrap_err();
        assert_eq!(err, MemoryError::UnsupportedSpace(Space::Cuda));
    }

    #[test]
    fn test_fill_and_copy() {
        let alloc = SystemAllocator::new();
        let a = alloc.allocate(Space::System, 8).unwrap();
        let b = alloc.allocate(Space::System, 8).unwrap();
        unsafe {
            alloc.fill(a, Space::System, 0xAB, 8).unwrap();
            alloc.copy_flat(b, Space::System, a, Space::System, 8).unwrap();
            let out = std::slice::from_raw_parts(b.as_ptr(), 8);
            assert!(out.iter().all(|&x| x == 0xAB));
            alloc.release(a, Space::System).unwrap();
            alloc.release(b, Space::System).unwrap();
        }
    }

    #[test]
    fn test_copy_2d_honours_pitch() {
        let alloc = SystemAllocator::new();
        // 3 rows of 2 bytes, source pitch 4, destination packed
        let src = alloc.allocate(Space::System, 12).unwrap();
        let dst = alloc.allocate(Space::System, 6).unwrap();
        unsafe {
            let s = std::slice::from_raw_parts_mut(src.as_ptr(), 12);
            for (i, byte) in s.iter_mut().enumerate() {
                *byte = i as u8;
            }
            alloc
                .copy_2d(Pitched::new(dst, 2), Space::System, Pitched::new(src, 4), Space::System, 2, 3)
                .unwrap();
            let d = std::slice::from_raw_parts(dst.as_ptr(), 6);
            assert_eq!(d, &[0, 1, 4, 5, 8, 9]);
            alloc.release(src, Space::System).unwrap();
            alloc.release(dst, Space::System).unwrap();
        }
    }

    #[test]
    fn test_foreign_pointer_is_system() {
        let alloc = SystemAllocator::new();
        let mut local = [0u8; 4];
        let handle = MemoryHandle::from_ptr(local.as_mut_ptr()).unwrap();
        assert_eq!(alloc.space_of(handle).unwrap(), Space::System);
    }
}
