//! Allocator trait implemented by every memory space provider
//!
//! This is the whole surface arrays need from a space: raw allocation,
//! release, byte fills, flat and pitched copies, and address-to-space lookup.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 SpaceAllocator                │
//! │  allocate / release / fill / fill_2d          │
//! │  copy_flat / copy_2d / space_of / synchronize │
//! └───────────────┬───────────────────────────────┘
//!                 │
//!        ┌────────┴─────────┐
//!        ▼                  ▼
//!  ┌───────────┐     ┌───────────┐
//!  │  System   │     │ Emulated  │
//!  │ Allocator │     │ Allocator │
//!  └───────────┘     └───────────┘
//! ```
//!
//! # Safety
//!
//! Handles are plain addresses, so every primitive that reads or writes
//! through one is `unsafe`: the caller guarantees that each handle is live,
//! that it belongs to the space passed alongside it, and that every byte
//! touched lies inside its allocation.

use crate::error::Result;
use crate::handle::{MemoryHandle, Pitched};
use crate::space::{self, Space};
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased allocator
pub type SharedAllocator = Arc<dyn SpaceAllocator>;

/// Raw memory primitives for one or more spaces
pub trait SpaceAllocator: Send + Sync + fmt::Debug {
    /// Allocate `bytes` bytes in `space`
    ///
    /// Contents are unspecified; callers wanting zeroes follow up with
    /// [`SpaceAllocator::zero`].
    fn allocate(&self, space: Space, bytes: usize) -> Result<MemoryHandle>;

    /// Return an allocation to its space
    ///
    /// # Safety
    ///
    /// `handle` must be the base of a live allocation made by this allocator
    /// in `space`, and nothing may use it afterwards.
    unsafe fn release(&self, handle: MemoryHandle, space: Space) -> Result<()>;

    /// Set `bytes` bytes starting at `dst` to `value`
    ///
    /// # Safety
    ///
    /// See the module-level contract.
    unsafe fn fill(&self, dst: MemoryHandle, space: Space, value: u8, bytes: usize) -> Result<()>;

    /// Set `width` bytes in each of `height` rows to `value`
    ///
    /// # Safety
    ///
    /// See the module-level contract.
    unsafe fn fill_2d(&self, dst: Pitched, space: Space, value: u8, width: usize, height: usize) -> Result<()>;

    /// Zero `bytes` bytes starting at `dst`
    ///
    /// # Safety
    ///
    /// See the module-level contract.
    unsafe fn zero(&self, dst: MemoryHandle, space: Space, bytes: usize) -> Result<()> {
        self.fill(dst, space, 0, bytes)
    }

    /// Copy `bytes` contiguous bytes between (possibly different) spaces
    ///
    /// May complete asynchronously for device spaces; see
    /// [`SpaceAllocator::synchronize`].
    ///
    /// # Safety
    ///
    /// See the module-level contract. Source and destination must not overlap.
    unsafe fn copy_flat(
        &self,
        dst: MemoryHandle,
        dst_space: Space,
        src: MemoryHandle,
        src_space: Space,
        bytes: usize,
    ) -> Result<()>;

    /// Copy `height` rows of `width` bytes, honouring each side's pitch
    ///
    /// # Safety
    ///
    /// See the module-level contract. Source and destination must not overlap.
    unsafe fn copy_2d(
        &self,
        dst: Pitched,
        dst_space: Space,
        src: Pitched,
        src_space: Space,
        width: usize,
        height: usize,
    ) -> Result<()>;

    /// Space the given address lives in
    fn space_of(&self, handle: MemoryHandle) -> Result<Space>;

    /// True iff `space` is reachable from any of `candidates`
    fn accessible(&self, space: Space, candidates: &[Space]) -> bool {
        space::accessible(space, candidates)
    }

    /// Wait until all transfers issued so far have completed
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
