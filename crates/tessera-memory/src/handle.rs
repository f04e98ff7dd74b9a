//! Raw memory handles

use std::fmt;
use std::ptr::NonNull;

/// Opaque address of memory in some space
///
/// A handle is just an address; it does not own or borrow anything and may
/// point into memory the host cannot dereference. Ownership is tracked one
/// level up, by whoever holds the allocation guard.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle(NonNull<u8>);

// SAFETY: a handle is an address value. Dereferencing it is gated behind the
// unsafe allocator primitives, whose callers own the synchronisation.
unsafe impl Send for MemoryHandle {}
unsafe impl Sync for MemoryHandle {}

impl MemoryHandle {
    /// Wrap a non-null pointer
    pub const fn new(ptr: NonNull<u8>) -> Self {
        Self(ptr)
    }

    /// Wrap a raw pointer, returning `None` if it is null
    pub fn from_ptr(ptr: *mut u8) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Numeric address
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Raw pointer; only host-accessible spaces may be dereferenced
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Handle `bytes` past this one
    ///
    /// Pure address arithmetic: the result is only meaningful while it stays
    /// inside the allocation this handle points into.
    pub fn byte_add(self, bytes: usize) -> Self {
        let ptr = self.0.as_ptr().wrapping_add(bytes);
        // Wrapping past the end of the address space is the only way to hit
        // null here, which no live allocation allows.
        Self(NonNull::new(ptr).unwrap_or(self.0))
    }
}

impl fmt::Debug for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryHandle({:#x})", self.addr())
    }
}

impl fmt::Display for MemoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.addr())
    }
}

/// A handle plus the row pitch used by 2D transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitched {
    pub handle: MemoryHandle,
    /// Distance in bytes between the starts of consecutive rows
    pub pitch: usize,
}

impl Pitched {
    pub const fn new(handle: MemoryHandle, pitch: usize) -> Self {
        Self { handle, pitch }
    }
}
