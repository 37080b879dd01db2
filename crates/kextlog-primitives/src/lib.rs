//! kextlog Unsafe Primitives - Consolidated Unsafe Code TCB
//!
//! This crate contains all unsafe code on the logging path, consolidated
//! into a single auditable location. `kextlog-core` uses
//! `#![deny(unsafe_code)]`; the test-only mock HAL is the one exception.
//!
//! # Design Principles
//!
//! 1. **Minimal unsafe surface**: Only raw HAL allocations are handled here
//! 2. **Safe wrappers**: All unsafe is wrapped in safe interfaces
//! 3. **Auditable**: Small, focused modules for security review
//!
//! # Module Organization
//!
//! - `heap` - Owning wrapper around a non-blocking HAL allocation

#![no_std]

pub mod heap;

pub use heap::HeapBuffer;
