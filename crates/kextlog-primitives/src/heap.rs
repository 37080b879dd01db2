//! Owning wrapper around a HAL heap allocation
//!
//! Oversize log records are formatted directly into memory obtained from
//! [`HAL::allocate`]. The allocation belongs to the stack frame that made
//! it, so the wrapper releases it in `Drop` and no exit path can leak it.
//!
//! # Safety Invariants
//!
//! 1. **Initialized**: The region is zero-filled before any slice is handed out
//! 2. **Exclusive**: The wrapper is the only owner of the region
//! 3. **Matched free**: `deallocate` receives the same size and alignment
//!    that `allocate` was called with, exactly once

use core::ops::{Deref, DerefMut};
use core::ptr::NonNull;

use kextlog_hal::{HalError, HAL};

/// A zero-initialized, heap-allocated byte region owned by the caller.
pub struct HeapBuffer<'h, H: HAL> {
    ptr: NonNull<u8>,
    len: usize,
    hal: &'h H,
}

impl<'h, H: HAL> HeapBuffer<'h, H> {
    /// Alignment requested from the HAL (covers the u64 timestamp field)
    pub const ALIGN: usize = 8;

    /// Allocate `len` bytes without blocking.
    ///
    /// # Returns
    /// * `Ok(HeapBuffer)` - Zero-filled region of exactly `len` bytes
    /// * `Err(HalError::InvalidArgument)` - `len` is zero
    /// * `Err(HalError::OutOfMemory)` - The HAL could not satisfy the request
    pub fn try_new(hal: &'h H, len: usize) -> Result<Self, HalError> {
        if len == 0 {
            return Err(HalError::InvalidArgument);
        }

        let raw = hal.allocate(len, Self::ALIGN)?;
        let ptr = NonNull::new(raw).ok_or(HalError::OutOfMemory)?;

        // SAFETY: `ptr` was just returned by the HAL for a region of `len`
        // bytes and nothing else references it yet.
        unsafe { ptr.as_ptr().write_bytes(0, len) };

        Ok(Self { ptr, len, hal })
    }

    /// Size of the region in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: zero-length buffers are rejected at allocation
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// View the region as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the region is `len` bytes, initialized in `try_new`, and
        // borrowed immutably through `&self`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the region as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as in `as_slice`, and `&mut self` guarantees exclusivity.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<H: HAL> Deref for HeapBuffer<'_, H> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<H: HAL> DerefMut for HeapBuffer<'_, H> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<H: HAL> Drop for HeapBuffer<'_, H> {
    fn drop(&mut self) {
        self.hal.deallocate(self.ptr.as_ptr(), self.len, Self::ALIGN);
    }
}

impl<H: HAL> core::fmt::Debug for HeapBuffer<'_, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeapBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
