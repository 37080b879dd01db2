//! Mock HAL implementation for testing kextlog
//!
//! This provides a mock implementation of the HAL trait that can be used
//! for unit testing the logger without a kernel. Unlike a kernel control
//! socket, every effect is captured so tests can assert on it:
//! console lines, records delivered per observer unit, and allocations.
//!
//! All state sits behind spin locks or atomics, so the mock can be shared
//! across threads in concurrency tests.

#![no_std]
extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use kextlog_hal::{ControlHandler, HalError, NumericControlRef, HAL};
use spin::Mutex;

/// The registered control channel
struct MockChannel {
    ctl: NumericControlRef,
    name: String,
    handler: Arc<dyn ControlHandler>,
}

/// Mock HAL for unit testing
///
/// Provides simulated time, memory, console and a single control channel
/// with injectable failures.
pub struct MockHal {
    /// Simulated time in ticks
    time: AtomicU64,
    /// Captured console output, one entry per write
    console_log: Mutex<Vec<String>>,
    /// Currently registered channel
    channel: Mutex<Option<MockChannel>>,
    /// Next control reference to hand out
    next_ctl: AtomicU32,
    /// Observers accepted by the handler (unit -> delivered records)
    observers: Mutex<BTreeMap<u32, Vec<Vec<u8>>>>,
    /// Remaining enqueue calls to reject
    enqueue_failures: AtomicU32,
    /// Total enqueue calls, successful or not
    enqueue_attempts: AtomicU64,
    /// Reject every allocation while set
    fail_allocations: AtomicBool,
    /// Error to return from the next registration
    register_failure: Mutex<Option<HalError>>,
    /// Error to return from the next deregistration
    deregister_failure: Mutex<Option<HalError>>,
    /// Outstanding allocations
    live_allocs: AtomicUsize,
    /// Successful allocations since creation
    total_allocs: AtomicUsize,
}

impl MockHal {
    /// Create a new mock HAL
    pub fn new() -> Self {
        Self::with_time(0)
    }

    /// Create a mock HAL with a specific starting time
    pub fn with_time(ticks: u64) -> Self {
        Self {
            time: AtomicU64::new(ticks),
            console_log: Mutex::new(Vec::new()),
            channel: Mutex::new(None),
            next_ctl: AtomicU32::new(1),
            observers: Mutex::new(BTreeMap::new()),
            enqueue_failures: AtomicU32::new(0),
            enqueue_attempts: AtomicU64::new(0),
            fail_allocations: AtomicBool::new(false),
            register_failure: Mutex::new(None),
            deregister_failure: Mutex::new(None),
            live_allocs: AtomicUsize::new(0),
            total_allocs: AtomicUsize::new(0),
        }
    }

    // === Time ===

    /// Advance the simulated time by the given number of ticks
    pub fn advance_time(&self, ticks: u64) {
        self.time.fetch_add(ticks, Ordering::SeqCst);
    }

    /// Set the simulated time to a specific value
    pub fn set_time(&self, ticks: u64) {
        self.time.store(ticks, Ordering::SeqCst);
    }

    // === Console ===

    /// Get all captured console writes
    pub fn get_console_log(&self) -> Vec<String> {
        self.console_log.lock().clone()
    }

    /// Clear the console log
    pub fn clear_console_log(&self) {
        self.console_log.lock().clear();
    }

    /// Check if any console write contains `substr`
    pub fn has_console_containing(&self, substr: &str) -> bool {
        self.console_log
            .lock()
            .iter()
            .any(|line| line.contains(substr))
    }

    /// Get the number of console writes
    pub fn console_count(&self) -> usize {
        self.console_log.lock().len()
    }

    // === Control channel ===

    /// Name of the registered channel, if any
    pub fn registered_name(&self) -> Option<String> {
        self.channel.lock().as_ref().map(|c| c.name.clone())
    }

    /// Whether a channel is currently registered
    pub fn is_registered(&self) -> bool {
        self.channel.lock().is_some()
    }

    /// Make the next `ctl_register` call fail with `err`
    pub fn fail_next_register(&self, err: HalError) {
        *self.register_failure.lock() = Some(err);
    }

    /// Make the next `ctl_deregister` call fail with `err`
    pub fn fail_next_deregister(&self, err: HalError) {
        *self.deregister_failure.lock() = Some(err);
    }

    /// Simulate an observer attaching as `unit`
    ///
    /// Invokes the registered handler; the unit only becomes deliverable
    /// if the handler accepts it.
    pub fn simulate_connect(&self, unit: u32) -> Result<(), HalError> {
        let handler = self.handler().ok_or(HalError::NotConnected)?;
        handler.connect(unit)?;
        self.observers.lock().insert(unit, Vec::new());
        Ok(())
    }

    /// Simulate observer `unit` detaching
    ///
    /// Like a kernel control socket, the handler is told about every
    /// closing unit, including ones it refused.
    pub fn simulate_disconnect(&self, unit: u32) {
        self.observers.lock().remove(&unit);
        if let Some(handler) = self.handler() {
            handler.disconnect(unit);
        }
    }

    /// Reject the next `n` enqueue calls with `NoBufferSpace`
    pub fn fail_next_enqueues(&self, n: u32) {
        self.enqueue_failures.store(n, Ordering::SeqCst);
    }

    /// Total enqueue calls seen, including rejected ones
    pub fn enqueue_attempts(&self) -> u64 {
        self.enqueue_attempts.load(Ordering::SeqCst)
    }

    /// Records delivered to `unit`, oldest first
    pub fn received(&self, unit: u32) -> Vec<Vec<u8>> {
        self.observers
            .lock()
            .get(&unit)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove and return the records delivered to `unit`
    pub fn take_received(&self, unit: u32) -> Vec<Vec<u8>> {
        self.observers
            .lock()
            .get_mut(&unit)
            .map(core::mem::take)
            .unwrap_or_default()
    }

    fn handler(&self) -> Option<Arc<dyn ControlHandler>> {
        self.channel.lock().as_ref().map(|c| Arc::clone(&c.handler))
    }

    // === Memory ===

    /// Make every allocation fail while `fail` is set
    pub fn set_allocation_failure(&self, fail: bool) {
        self.fail_allocations.store(fail, Ordering::SeqCst);
    }

    /// Allocations not yet released
    pub fn live_allocations(&self) -> usize {
        self.live_allocs.load(Ordering::SeqCst)
    }

    /// Successful allocations since creation
    pub fn total_allocations(&self) -> usize {
        self.total_allocs.load(Ordering::SeqCst)
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl HAL for MockHal {
    type ControlRef = NumericControlRef;

    fn ctl_register(
        &self,
        name: &str,
        handler: Arc<dyn ControlHandler>,
    ) -> Result<Self::ControlRef, HalError> {
        if let Some(err) = self.register_failure.lock().take() {
            return Err(err);
        }

        let mut channel = self.channel.lock();
        if channel.is_some() {
            // One channel per name space in this mock
            return Err(HalError::AlreadyConnected);
        }

        let ctl = NumericControlRef::new(self.next_ctl.fetch_add(1, Ordering::SeqCst));
        *channel = Some(MockChannel {
            ctl,
            name: String::from(name),
            handler,
        });
        Ok(ctl)
    }

    fn ctl_deregister(&self, ctl: Self::ControlRef) -> Result<(), HalError> {
        if let Some(err) = self.deregister_failure.lock().take() {
            return Err(err);
        }

        let mut channel = self.channel.lock();
        match channel.as_ref() {
            Some(c) if c.ctl == ctl => {
                *channel = None;
                self.observers.lock().clear();
                Ok(())
            }
            _ => Err(HalError::InvalidArgument),
        }
    }

    fn ctl_enqueue(&self, ctl: Self::ControlRef, unit: u32, data: &[u8]) -> Result<(), HalError> {
        self.enqueue_attempts.fetch_add(1, Ordering::SeqCst);

        let registered = self.channel.lock().as_ref().map(|c| c.ctl);
        if registered != Some(ctl) {
            return Err(HalError::InvalidArgument);
        }

        let failing = self
            .enqueue_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(HalError::NoBufferSpace);
        }

        match self.observers.lock().get_mut(&unit) {
            Some(queue) => {
                queue.push(data.to_vec());
                Ok(())
            }
            None => Err(HalError::NotConnected),
        }
    }

    fn allocate(&self, size: usize, align: usize) -> Result<*mut u8, HalError> {
        if self.fail_allocations.load(Ordering::SeqCst) {
            return Err(HalError::OutOfMemory);
        }

        // In mock, we use the global allocator
        let layout = core::alloc::Layout::from_size_align(size, align)
            .map_err(|_| HalError::InvalidArgument)?;
        if layout.size() == 0 {
            return Err(HalError::InvalidArgument);
        }
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        if ptr.is_null() {
            Err(HalError::OutOfMemory)
        } else {
            self.live_allocs.fetch_add(1, Ordering::SeqCst);
            self.total_allocs.fetch_add(1, Ordering::SeqCst);
            Ok(ptr)
        }
    }

    fn deallocate(&self, ptr: *mut u8, size: usize, align: usize) {
        if ptr.is_null() {
            return;
        }
        if let Ok(layout) = core::alloc::Layout::from_size_align(size, align) {
            unsafe { alloc::alloc::dealloc(ptr, layout) };
            self.live_allocs.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn now_ticks(&self) -> u64 {
        self.time.load(Ordering::SeqCst)
    }

    fn console_write(&self, args: fmt::Arguments<'_>) {
        self.console_log.lock().push(alloc::format!("{}", args));
    }
}
