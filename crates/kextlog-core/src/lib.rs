//! kextlog Core - Single-Observer Control-Channel Logger
//!
//! Log records produced anywhere in a kernel module are delivered to at
//! most one observer attached to a control channel. When nobody is
//! attached, or the channel rejects a record, the message goes to the
//! console synchronously instead.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        kextlog-core                         │
//! │                                                             │
//! │   ┌───────────────┐    ┌───────────────┐    ┌───────────┐  │
//! │   │  Connection   │    │    Message    │    │ Delivery  │  │
//! │   │  Registry     │───▶│    Builder    │───▶│ Guard     │  │
//! │   │  (CAS word)   │    │ (stack/heap)  │    │ (spin)    │  │
//! │   └───────────────┘    └───────────────┘    └───────────┘  │
//! │           ▲                                       │        │
//! │           │ connect/disconnect                    │ enqueue│
//! └───────────┼───────────────────────────────────────┼────────┘
//!             │                                       ▼
//! ┌───────────┴─────────────────────────────────────────────────┐
//! │                      kextlog-hal (HAL)                      │
//! │   control channel · allocator · monotonic clock · console   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! - The attachment check is one atomic load; attach/detach are CAS only
//! - The only blocking point is the delivery spin lock around one
//!   platform enqueue call
//! - Oversize records own their heap buffer and free it on every path
//!
//! # Module Organization
//!
//! - `types` - Level, record flags, unit identifiers
//! - `wire` - Record layout, sizing and observer-side decoding
//! - `format` - Bounded, allocation-free formatting
//! - `registry` - Connection registry
//! - `record` - Message builder
//! - `guard` - Delivery channel guard and drop memory
//! - `logger` - Lifecycle glue and console fallback
//! - `global` - Process-wide sink and producer macros
//! - `invariants` - Record invariant checks

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]
extern crate alloc;

pub mod config;
pub mod error;
pub mod format;
pub mod global;
pub mod guard;
pub mod invariants;
pub mod logger;
pub mod record;
pub mod registry;
pub mod types;
pub mod wire;


// Re-export all public types for convenient access
pub use config::{LoggerConfig, CONTROL_NAME, INLINE_MSG_SIZE, MAX_BUILD_ATTEMPTS};
pub use error::{DecodeError, KextlogError};
pub use global::LogSink;
pub use guard::{DeliveryGuard, SendFailure};
pub use invariants::{check_record, InvariantViolation};
pub use logger::{Logger, LoggerStats};
pub use record::LogRecord;
pub use registry::ConnectionRegistry;
pub use types::{Level, RecordFlags, UnitId};
pub use wire::{decode, records, DecodedRecord, OwnedRecord, RecordHeader, HEADER_LEN};
