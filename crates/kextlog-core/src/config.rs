//! Logger configuration
//!
//! Everything is fixed at build or construction time. There is no runtime
//! reconfiguration: the logger is set up once at module load.

use crate::error::KextlogError;
use crate::wire::HEADER_LEN;

/// Default control channel name observers connect to
pub const CONTROL_NAME: &str = "net.tty4.kext.kctl.log";

/// Longest control channel name the host transport accepts (including NUL)
pub const MAX_CONTROL_NAME_LEN: usize = 96;

/// Default size of the stack record (header + text)
pub const INLINE_MSG_SIZE: usize = 256;

/// Largest stack record accepted by [`LoggerConfig::check_inline_size`]
pub const MAX_INLINE_MSG_SIZE: usize = 64 * 1024;

/// Build attempts per log call before an inconsistent oversize message
/// is delivered truncated instead
pub const MAX_BUILD_ATTEMPTS: usize = 2;

/// Construction-time logger settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Control channel name registered with the platform
    pub control_name: &'static str,
    /// Text prepended to console fallback output
    pub fallback_prefix: Option<&'static str>,
}

impl LoggerConfig {
    /// Default configuration with a different channel name
    pub fn with_control_name(control_name: &'static str) -> Self {
        Self {
            control_name,
            ..Self::default()
        }
    }

    /// Check the configuration against host transport limits.
    pub fn validate(&self) -> Result<(), KextlogError> {
        if self.control_name.is_empty() {
            return Err(KextlogError::InvalidConfig("control name is empty"));
        }
        if self.control_name.len() >= MAX_CONTROL_NAME_LEN {
            return Err(KextlogError::InvalidConfig("control name too long"));
        }
        if self.control_name.as_bytes().contains(&0) {
            return Err(KextlogError::InvalidConfig("control name contains NUL"));
        }
        Ok(())
    }

    /// Check a stack record size: it must hold the header, at least one
    /// byte of text and the terminator.
    pub fn check_inline_size(size: usize) -> Result<(), KextlogError> {
        if size < HEADER_LEN + 2 {
            return Err(KextlogError::InvalidConfig("inline buffer smaller than header"));
        }
        if size > MAX_INLINE_MSG_SIZE {
            return Err(KextlogError::InvalidConfig("inline buffer too large"));
        }
        Ok(())
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            control_name: CONTROL_NAME,
            fallback_prefix: None,
        }
    }
}
