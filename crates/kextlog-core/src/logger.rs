//! The logger: lifecycle glue around the registry, builder and guard
//!
//! ```text
//!  log(level, args)
//!        │
//!        ▼
//!  registry.is_attached()? ──no──────────────────────────┐
//!        │ yes                                           │
//!        ▼                                               ▼
//!  record::build ──▶ guard.send ──ok──▶ observer    console_write
//!                        │                               ▲
//!                        └──failed (drop armed)──────────┘
//! ```
//!
//! `log` never reports an error. Registration and deregistration happen
//! once each, at module load and unload, and report to the host.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

use kextlog_hal::{ControlHandler, HalError, HAL};

use crate::config::{LoggerConfig, INLINE_MSG_SIZE};
use crate::error::KextlogError;
use crate::global::LogSink;
use crate::guard::{DeliveryGuard, SendFailure};
use crate::record;
use crate::registry::ConnectionRegistry;
use crate::types::{Level, RecordFlags, UnitId};

/// Snapshot of delivery counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoggerStats {
    /// Records accepted by the control channel
    pub delivered: u64,
    /// Records the control channel rejected
    pub failed: u64,
    /// Records sent with `TRUNCATED`
    pub truncated: u64,
    /// Log calls written to the console
    pub fallback: u64,
}

#[derive(Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
    truncated: AtomicU64,
    fallback: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Control-channel logger with console fallback.
///
/// `N` is the size of the stack record used for messages that need no
/// allocation.
pub struct Logger<H: HAL, const N: usize = INLINE_MSG_SIZE> {
    hal: H,
    config: LoggerConfig,
    registry: ConnectionRegistry,
    guard: DeliveryGuard<H::ControlRef>,
    counters: Counters,
}

impl<H: HAL, const N: usize> Logger<H, N> {
    /// Create an unregistered logger.
    pub fn new(hal: H, config: LoggerConfig) -> Result<Self, KextlogError> {
        config.validate()?;
        LoggerConfig::check_inline_size(N)?;
        Ok(Self {
            hal,
            config,
            registry: ConnectionRegistry::new(),
            guard: DeliveryGuard::new(),
            counters: Counters::default(),
        })
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Whether the control channel is registered
    pub fn is_registered(&self) -> bool {
        self.guard.control().is_some()
    }

    /// Whether the next delivered record will report a drop
    pub fn drop_pending(&self) -> bool {
        self.guard.drop_pending()
    }

    pub fn stats(&self) -> LoggerStats {
        LoggerStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            truncated: self.counters.truncated.load(Ordering::Relaxed),
            fallback: self.counters.fallback.load(Ordering::Relaxed),
        }
    }

    /// Register the control channel. Called once at module load.
    ///
    /// The platform keeps a reference to this logger for connect and
    /// disconnect callbacks until [`deregister`](Self::deregister).
    pub fn register(self: &Arc<Self>) -> Result<(), KextlogError> {
        if self.is_registered() {
            return Err(KextlogError::AlreadyRegistered);
        }

        let handler: Arc<dyn ControlHandler> = self.clone();
        let name = self.config.control_name;
        match self.hal.ctl_register(name, handler) {
            Ok(ctl) => {
                if !self.guard.install(ctl) {
                    // Lost a race with a concurrent register; undo ours
                    let _ = self.hal.ctl_deregister(ctl);
                    return Err(KextlogError::AlreadyRegistered);
                }
                self.hal.console_write(format_args!(
                    "[kextlog] kctl {} registered  ref: {:?}",
                    name, ctl
                ));
                Ok(())
            }
            Err(e) => {
                self.hal.console_write(format_args!(
                    "[kextlog] ctl_register() fail  errno: {} ({})",
                    e.errno(),
                    e
                ));
                Err(KextlogError::Register(e))
            }
        }
    }

    /// Deregister the control channel. Called once at module unload.
    pub fn deregister(&self) -> Result<(), KextlogError> {
        let ctl = self.guard.control().ok_or(KextlogError::NotRegistered)?;

        match self.hal.ctl_deregister(ctl) {
            Ok(()) => {
                // Detach first so no new record reaches the guard, then
                // drop the channel and whatever drop memory was armed
                self.registry.on_disconnect(self.registry.current_unit());
                self.guard.uninstall();
                self.hal.console_write(format_args!(
                    "[kextlog] kctl {} deregistered  ref: {:?}",
                    self.config.control_name, ctl
                ));
                Ok(())
            }
            Err(e) => {
                self.hal.console_write(format_args!(
                    "[kextlog] ctl_deregister() fail  ref: {:?} errno: {} ({})",
                    ctl,
                    e.errno(),
                    e
                ));
                Err(KextlogError::Deregister(e))
            }
        }
    }

    /// Log a message. Never fails and never blocks beyond the delivery spin.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let Some(mut record) = record::build::<H, N>(&self.hal, &self.registry, level, args) else {
            self.emit_plain(args);
            return;
        };

        if record.header().flags.contains(RecordFlags::TRUNCATED) {
            Counters::bump(&self.counters.truncated);
        }
        debug_assert!(crate::invariants::check_record(record.as_wire()).is_empty());

        match self.guard.send(&self.hal, &self.registry, &mut record) {
            Ok(_) => Counters::bump(&self.counters.delivered),
            Err(failure) => {
                Counters::bump(&self.counters.failed);
                self.report_failure(&failure);
                self.emit_plain(args);
            }
        }
    }

    /// Synchronous console write of the original message.
    fn emit_plain(&self, args: fmt::Arguments<'_>) {
        Counters::bump(&self.counters.fallback);
        match self.config.fallback_prefix {
            Some(prefix) => self.hal.console_write(format_args!("{}{}", prefix, args)),
            None => self.hal.console_write(args),
        }
    }

    fn report_failure(&self, failure: &SendFailure) {
        self.hal.console_write(format_args!(
            "[kextlog] enqueue failed  unit: {} len: {} errno: {} ({})",
            failure.unit,
            failure.len,
            failure.error.errno(),
            failure.error
        ));
    }
}

impl<H: HAL, const N: usize> ControlHandler for Logger<H, N> {
    fn connect(&self, unit: u32) -> Result<(), HalError> {
        match self.registry.on_connect(UnitId(unit)) {
            Ok(()) => {
                self.hal
                    .console_write(format_args!("[kextlog] kctl connected  unit: {}", unit));
                Ok(())
            }
            Err(KextlogError::AlreadyConnected) => {
                self.hal.console_write(format_args!(
                    "[kextlog] kctl already connected  skip unit: {}",
                    unit
                ));
                Err(HalError::AlreadyConnected)
            }
            Err(_) => Err(HalError::InvalidArgument),
        }
    }

    fn disconnect(&self, unit: u32) {
        // Refused units land here too and change nothing
        if self.registry.on_disconnect(UnitId(unit)) {
            self.hal
                .console_write(format_args!("[kextlog] kctl disconnected  unit: {}", unit));
        }
    }
}

impl<H: HAL, const N: usize> LogSink for Logger<H, N> {
    fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        Logger::log(self, level, args);
    }
}
