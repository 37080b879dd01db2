//! Connection registry
//!
//! Tracks the single attached observer as one atomic word. Producers read
//! it on every log call without locking; attach and detach move it only by
//! compare-and-swap, so a connect and a concurrent disconnect can never
//! both take effect against the same value.
//!
//! ```text
//!            on_connect(u) [0 -> u]
//!   ┌──────┐ ─────────────────────────▶ ┌─────────────┐
//!   │  0   │                            │  attached u │
//!   └──────┘ ◀───────────────────────── └─────────────┘
//!            on_disconnect(u) [u -> 0]
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::KextlogError;
use crate::types::UnitId;

/// Ordering of a successful attach/detach CAS
pub(crate) const CAS_SUCCESS: Ordering = Ordering::AcqRel;
/// Ordering of a failed attach/detach CAS
pub(crate) const CAS_FAILURE: Ordering = Ordering::Acquire;
/// Ordering of the hot-path attachment load
pub(crate) const LOAD: Ordering = Ordering::Acquire;

/// Which observer unit, if any, holds the delivery channel.
#[derive(Debug)]
pub struct ConnectionRegistry {
    attached_unit: AtomicU32,
}

impl ConnectionRegistry {
    /// Create a registry with no observer attached.
    pub const fn new() -> Self {
        Self {
            attached_unit: AtomicU32::new(0),
        }
    }

    /// Attach `unit` if nobody is attached.
    ///
    /// # Returns
    /// * `Ok(())` - `unit` is now the attached observer
    /// * `Err(KextlogError::AlreadyConnected)` - another unit holds the channel
    /// * `Err(KextlogError::InvalidUnit)` - `unit` is the reserved 0
    pub fn on_connect(&self, unit: UnitId) -> Result<(), KextlogError> {
        if !unit.is_attached() {
            return Err(KextlogError::InvalidUnit(unit.get()));
        }
        self.attached_unit
            .compare_exchange(0, unit.get(), CAS_SUCCESS, CAS_FAILURE)
            .map(|_| ())
            .map_err(|_| KextlogError::AlreadyConnected)
    }

    /// Detach `unit` if it is the attached observer.
    ///
    /// Returns false, changing nothing, for any other unit. That is the
    /// normal outcome for a unit whose connect was refused.
    pub fn on_disconnect(&self, unit: UnitId) -> bool {
        if !unit.is_attached() {
            return false;
        }
        self.attached_unit
            .compare_exchange(unit.get(), 0, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }

    /// Lock-free attachment check for the producer hot path.
    #[inline]
    pub fn is_attached(&self) -> bool {
        self.current_unit().is_attached()
    }

    /// Currently attached unit, or [`UnitId::NONE`].
    #[inline]
    pub fn current_unit(&self) -> UnitId {
        UnitId(self.attached_unit.load(LOAD))
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
