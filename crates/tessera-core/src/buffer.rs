//! Raw byte buffers tagged with their memory space
//!
//! A [`Buffer`] is an address range in one space plus the allocator that
//! serves it. Release responsibility is not spread across every buffer that
//! points at an allocation: it lives in a single [`Allocation`] guard created
//! where the memory was allocated, and every buffer sharing that allocation
//! holds the guard through an `Arc`. The last holder to go away releases the
//! memory, exactly once.
//!
//! Buffers wrapped around caller memory carry no guard and never release.

use crate::error::Result;
use std::fmt;
use std::sync::Arc;
use tessera_memory::{MemoryHandle, SharedAllocator, Space};

/// Whether an array is responsible for its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Fresh allocation or copy
    Owned,
    /// View of another array, or a wrapped caller buffer
    Borrowed,
}

/// Releases one allocation when dropped
pub struct Allocation {
    allocator: SharedAllocator,
    handle: MemoryHandle,
    space: Space,
    len: usize,
}

impl Allocation {
    pub fn handle(&self) -> MemoryHandle {
        self.handle
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("handle", &self.handle)
            .field("space", &self.space)
            .field("len", &self.len)
            .finish()
    }
}

impl Drop for Allocation {
    fn drop(&mut self) {
        // SAFETY: the guard is created once per allocation and only dropped
        // when no buffer refers to it any more.
        match unsafe { self.allocator.release(self.handle, self.space) } {
            Ok(()) => tracing::debug!(handle = %self.handle, space = %self.space, bytes = self.len, "buffer_released"),
            Err(err) => tracing::warn!(handle = %self.handle, space = %self.space, error = %err, "buffer_release_failed"),
        }
    }
}

/// Address range in a memory space
#[derive(Clone)]
pub struct Buffer {
    allocator: SharedAllocator,
    handle: MemoryHandle,
    len: usize,
    space: Space,
    guard: Option<Arc<Allocation>>,
}

impl Buffer {
    /// Allocate `bytes` zeroed bytes in `space`
    pub fn zeroed(allocator: &SharedAllocator, space: Space, bytes: usize) -> Result<Self> {
        let handle = allocator.allocate(space, bytes)?;
        let guard = Arc::new(Allocation {
            allocator: Arc::clone(allocator),
            handle,
            space,
            len: bytes,
        });

        // SAFETY: the allocation was just made in `space` with `bytes` bytes.
        // On failure the guard above releases it.
        unsafe { allocator.zero(handle, space, bytes)? };

        tracing::debug!(%handle, %space, bytes, "buffer_allocated");

        Ok(Self {
            allocator: Arc::clone(allocator),
            handle,
            len: bytes,
            space,
            guard: Some(guard),
        })
    }

    /// Wrap memory the caller owns
    ///
    /// # Safety
    ///
    /// `handle` must point at `len` bytes in `space` that stay valid for as
    /// long as the buffer, or anything derived from it, is alive.
    pub unsafe fn from_raw(allocator: &SharedAllocator, handle: MemoryHandle, len: usize, space: Space) -> Self {
        Self {
            allocator: Arc::clone(allocator),
            handle,
            len,
            space,
            guard: None,
        }
    }

    /// Base address
    pub fn handle(&self) -> MemoryHandle {
        self.handle
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn space(&self) -> Space {
        self.space
    }

    pub fn allocator(&self) -> &SharedAllocator {
        &self.allocator
    }

    /// Whether this buffer keeps an allocation alive
    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Number of buffers sharing the allocation guard (0 for wrapped memory)
    pub fn holders(&self) -> usize {
        self.guard.as_ref().map_or(0, Arc::strong_count)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("len", &self.len)
            .field("space", &self.space)
            .field("guarded", &self.is_guarded())
            .finish()
    }
}
