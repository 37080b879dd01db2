//! Error types for kextlog
//!
//! Only lifecycle operations surface errors. The producer-facing `log`
//! path absorbs every failure into the console fallback.

use kextlog_hal::HalError;

/// Errors returned by lifecycle and connection operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum KextlogError {
    /// A second observer tried to attach while one is active.
    #[error("observer already connected")]
    AlreadyConnected,

    /// Unit 0 is reserved for "no observer".
    #[error("invalid observer unit: {0}")]
    InvalidUnit(u32),

    /// The platform refused control channel registration.
    #[error("control channel registration failed: {0}")]
    Register(HalError),

    /// The platform refused control channel deregistration.
    #[error("control channel deregistration failed: {0}")]
    Deregister(HalError),

    /// The control channel is already registered.
    #[error("control channel already registered")]
    AlreadyRegistered,

    /// Deregistration requested with no channel registered.
    #[error("control channel not registered")]
    NotRegistered,

    /// A global sink is already installed.
    #[error("global log sink already installed")]
    AlreadyInstalled,

    /// Logger configuration rejected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Errors produced while decoding wire records on the observer side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Fewer bytes than a record header plus terminator.
    #[error("record too short: {0} bytes")]
    TooShort(usize),

    /// Declared size is zero; every record carries at least a terminator.
    #[error("record declares zero size")]
    ZeroSize,

    /// Declared text size disagrees with the bytes available.
    #[error("size mismatch: declared {declared} bytes, {available} available")]
    SizeMismatch { declared: usize, available: usize },

    /// The byte at `size - 1` is not a NUL terminator.
    #[error("record text is not NUL-terminated")]
    MissingTerminator,
}
