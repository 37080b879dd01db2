//! Process-wide log sink and producer macros
//!
//! The module installs its logger once at load time; producers anywhere in
//! the module then log through the macros without carrying a reference.
//! Messages logged before installation are discarded.
//!
//! ```ignore
//! let logger = Arc::new(Logger::new(hal, LoggerConfig::default())?);
//! logger.register()?;
//! kextlog_core::global::install(logger.clone())?;
//!
//! log_info!("attached {} devices", count);
//! ```

use alloc::sync::Arc;
use core::fmt;

use spin::Once;

use crate::error::KextlogError;
use crate::types::Level;

/// Anything that accepts formatted log requests.
pub trait LogSink: Send + Sync {
    fn log(&self, level: Level, args: fmt::Arguments<'_>);
}

static SINK: Once<Arc<dyn LogSink>> = Once::new();

/// Install the process-wide sink. Only the first call succeeds.
pub fn install(sink: Arc<dyn LogSink>) -> Result<(), KextlogError> {
    let mut installed = false;
    SINK.call_once(|| {
        installed = true;
        sink
    });
    if installed {
        Ok(())
    } else {
        Err(KextlogError::AlreadyInstalled)
    }
}

/// The installed sink, if any
pub fn sink() -> Option<&'static Arc<dyn LogSink>> {
    SINK.get()
}

/// Route a log request to the installed sink.
#[doc(hidden)]
pub fn log(level: Level, args: fmt::Arguments<'_>) {
    if let Some(sink) = SINK.get() {
        sink.log(level, args);
    }
}

/// Log with an explicit level through the global sink.
///
/// # Example
///
/// ```ignore
/// kextlog!(Level(9), "custom level {}", 9);
/// ```
#[macro_export]
macro_rules! kextlog {
    ($level:expr, $($arg:tt)+) => {
        $crate::global::log($level, format_args!($($arg)+))
    };
}

/// Trace-level log through the global sink.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)+) => {
        $crate::kextlog!($crate::Level::TRACE, $($arg)+)
    };
}

/// Debug-level log through the global sink.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::kextlog!($crate::Level::DEBUG, $($arg)+)
    };
}

/// Info-level log through the global sink.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::kextlog!($crate::Level::INFO, $($arg)+)
    };
}

/// Warning log through the global sink.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => {
        $crate::kextlog!($crate::Level::WARN, $($arg)+)
    };
}

/// Error log through the global sink.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::kextlog!($crate::Level::ERROR, $($arg)+)
    };
}
