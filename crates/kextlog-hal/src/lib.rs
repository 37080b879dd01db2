//! Hardware Abstraction Layer trait for kextlog
//!
//! The logger core never talks to the host kernel directly. Everything it
//! consumes from its environment is expressed as a capability on the [`HAL`]
//! trait so the same core runs inside a kernel extension, on a test host, or
//! under a model checker.
//!
//! # Capabilities
//!
//! - **Control channel**: register/deregister a named channel and enqueue
//!   bytes to an attached observer unit. The platform calls back into a
//!   [`ControlHandler`] when an observer attaches or detaches.
//! - **Memory**: best-effort, non-blocking allocation that may fail under
//!   memory pressure.
//! - **Time**: a monotonic tick counter.
//! - **Console**: a synchronous, always-available text sink.

#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use core::fmt;

/// Callbacks the platform invokes on observer attach/detach.
///
/// Implementations must not block: the platform may invoke these from
/// its own locked sections.
pub trait ControlHandler: Send + Sync {
    /// An observer wants to attach as `unit`.
    ///
    /// Returning an error refuses the attachment; the platform reports the
    /// error to the connecting observer.
    fn connect(&self, unit: u32) -> Result<(), HalError>;

    /// Observer `unit` detached.
    ///
    /// Also invoked for units whose `connect` was refused.
    fn disconnect(&self, unit: u32);
}

/// Hardware Abstraction Layer trait
///
/// Implementations provide platform-specific functionality for:
/// - Control channel registration and delivery
/// - Memory allocation
/// - Time measurement
/// - Console output
///
/// # Associated Types
///
/// - `ControlRef`: Platform-specific reference to a registered control channel
///   - On a kernel extension: the `kern_ctl_ref` returned by registration
///   - In tests: a numeric handle
pub trait HAL: Send + Sync + 'static {
    /// Reference to a registered control channel
    type ControlRef: Copy + Send + Sync + fmt::Debug;

    // === Control Channel ===

    /// Register a named control channel
    ///
    /// # Arguments
    /// * `name` - Channel name observers connect to
    /// * `handler` - Receives connect/disconnect callbacks until deregistration
    ///
    /// # Returns
    /// * `Ok(ControlRef)` - Channel registered
    /// * `Err(HalError)` - Registration refused by the platform
    fn ctl_register(
        &self,
        name: &str,
        handler: Arc<dyn ControlHandler>,
    ) -> Result<Self::ControlRef, HalError>;

    /// Deregister a control channel
    ///
    /// The platform drops its reference to the handler on success.
    fn ctl_deregister(&self, ctl: Self::ControlRef) -> Result<(), HalError>;

    /// Queue `data` for delivery to observer `unit`
    ///
    /// Must not block. The bytes are copied before returning.
    ///
    /// # Returns
    /// * `Ok(())` - Data accepted for delivery
    /// * `Err(HalError::NoBufferSpace)` - Observer's receive queue is full
    /// * `Err(HalError::NotConnected)` - `unit` is not attached
    fn ctl_enqueue(&self, ctl: Self::ControlRef, unit: u32, data: &[u8]) -> Result<(), HalError>;

    // === Memory ===

    /// Allocate memory without blocking
    ///
    /// # Arguments
    /// * `size` - Number of bytes to allocate
    /// * `align` - Alignment requirement
    ///
    /// # Returns
    /// * `Ok(ptr)` - Pointer to allocated memory
    /// * `Err(HalError::OutOfMemory)` - Allocation failed
    fn allocate(&self, size: usize, align: usize) -> Result<*mut u8, HalError>;

    /// Deallocate memory
    ///
    /// Null pointers are ignored.
    ///
    /// # Safety
    /// The pointer must have been allocated by `allocate` with the same size and alignment
    fn deallocate(&self, ptr: *mut u8, size: usize, align: usize);

    // === Time ===

    /// Monotonic timestamp in platform ticks
    fn now_ticks(&self) -> u64;

    // === Console ===

    /// Synchronously write formatted text to the platform console
    fn console_write(&self, args: fmt::Arguments<'_>);
}

/// HAL errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    /// Not enough memory available
    #[error("out of memory")]
    OutOfMemory,
    /// Operation not supported on this platform
    #[error("not supported")]
    NotSupported,
    /// Invalid argument
    #[error("invalid argument")]
    InvalidArgument,
    /// Another observer already holds the channel
    #[error("already connected")]
    AlreadyConnected,
    /// No observer is attached under the given unit
    #[error("not connected")]
    NotConnected,
    /// Observer receive queue is full
    #[error("no buffer space available")]
    NoBufferSpace,
    /// I/O error
    #[error("I/O error")]
    IoError,
}

impl HalError {
    /// BSD errno equivalent, for hosts that surface errors as integers
    pub fn errno(self) -> i32 {
        match self {
            HalError::OutOfMemory => 12,
            HalError::NotSupported => 45,
            HalError::InvalidArgument => 22,
            HalError::AlreadyConnected => 56,
            HalError::NotConnected => 57,
            HalError::NoBufferSpace => 55,
            HalError::IoError => 5,
        }
    }
}

/// A simple control reference for platforms that use numeric IDs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NumericControlRef(pub u32);

impl NumericControlRef {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u32 {
        self.0
    }
}
