//! Delivery channel guard
//!
//! Serializes every hand-off to the control channel behind a spin lock.
//! The lock also owns the channel reference and the one-bit drop memory:
//! when an enqueue fails the bit is armed, and the next record that goes
//! through the guard carries [`RecordFlags::DROPPED`] to the observer.
//!
//! The critical section is one platform call, so a spin lock is used rather
//! than a blocking mutex: producers may run where sleeping is not allowed.
//! Only the most recent failure is remembered; two failures in a row are
//! reported as one.

use kextlog_hal::{HalError, HAL};
use spin::Mutex;

use crate::record::LogRecord;
use crate::registry::ConnectionRegistry;
use crate::types::{RecordFlags, UnitId};

/// One-bit memory of a failed hand-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct DropMemory {
    last_dropped: bool,
}

impl DropMemory {
    /// Flags the next record must carry; clears the memory.
    pub(crate) fn take(&mut self) -> RecordFlags {
        if core::mem::take(&mut self.last_dropped) {
            RecordFlags::DROPPED
        } else {
            RecordFlags::empty()
        }
    }

    pub(crate) fn arm(&mut self) {
        self.last_dropped = true;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.last_dropped
    }
}

/// State only touched with the guard held
struct DeliveryState<C> {
    /// Registered control channel, if any
    ctl: Option<C>,
    drops: DropMemory,
}

/// Details of a failed hand-off, reported after the guard is released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendFailure {
    /// Unit the record was addressed to (NONE if nobody was attached)
    pub unit: UnitId,
    /// Bytes that were to be sent
    pub len: usize,
    pub error: HalError,
}

/// Mutual exclusion over the single delivery path.
pub struct DeliveryGuard<C> {
    state: Mutex<DeliveryState<C>>,
}

impl<C: Copy> DeliveryGuard<C> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(DeliveryState {
                ctl: None,
                drops: DropMemory { last_dropped: false },
            }),
        }
    }

    /// Registered control channel
    pub fn control(&self) -> Option<C> {
        self.state.lock().ctl
    }

    /// Install the channel reference after registration.
    ///
    /// Returns false, leaving the existing reference, if one is installed.
    pub fn install(&self, ctl: C) -> bool {
        let mut state = self.state.lock();
        if state.ctl.is_some() {
            return false;
        }
        state.ctl = Some(ctl);
        true
    }

    /// Remove the channel reference after deregistration.
    ///
    /// Clears the drop memory. Sends that reach the guard afterwards fail
    /// without arming it: there is no channel left to report a drop on.
    pub fn uninstall(&self) -> Option<C> {
        let mut state = self.state.lock();
        state.drops = DropMemory::default();
        state.ctl.take()
    }

    /// Whether the next delivered record will carry `DROPPED`
    pub fn drop_pending(&self) -> bool {
        self.state.lock().drops.is_armed()
    }

    /// Hand `record` to the control channel.
    ///
    /// The destination unit is read inside the critical section, not
    /// before it. On failure the caller must fall back to the console.
    pub fn send<H, const N: usize>(
        &self,
        hal: &H,
        registry: &ConnectionRegistry,
        record: &mut LogRecord<'_, H, N>,
    ) -> Result<UnitId, SendFailure>
    where
        H: HAL<ControlRef = C>,
    {
        let mut state = self.state.lock();

        let unit = registry.current_unit();
        let Some(ctl) = state.ctl else {
            return Err(SendFailure {
                unit,
                len: record.as_wire().len(),
                error: HalError::NotConnected,
            });
        };

        let pending = state.drops.take();
        if !pending.is_empty() {
            record.add_flags(pending);
        }

        let result = if unit.is_attached() {
            hal.ctl_enqueue(ctl, unit.get(), record.as_wire())
        } else {
            Err(HalError::NotConnected)
        };

        match result {
            Ok(()) => Ok(unit),
            Err(error) => {
                state.drops.arm();
                Err(SendFailure {
                    unit,
                    len: record.as_wire().len(),
                    error,
                })
            }
        }
    }
}

impl<C: Copy> Default for DeliveryGuard<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::build;
    use crate::wire;
    use alloc::sync::Arc;
    use kextlog_hal::{ControlHandler, NumericControlRef};
    use kextlog_hal_mock::MockHal;

    struct AcceptAll;

    impl ControlHandler for AcceptAll {
        fn connect(&self, _unit: u32) -> Result<(), HalError> {
            Ok(())
        }

        fn disconnect(&self, _unit: u32) {}
    }

    struct Fixture {
        hal: MockHal,
        registry: ConnectionRegistry,
        guard: DeliveryGuard<NumericControlRef>,
    }

    fn fixture() -> Fixture {
        let hal = MockHal::new();
        let ctl = hal.ctl_register("test", Arc::new(AcceptAll)).unwrap();
        hal.simulate_connect(1).unwrap();

        let registry = ConnectionRegistry::new();
        registry.on_connect(UnitId(1)).unwrap();

        let guard = DeliveryGuard::new();
        assert!(guard.install(ctl));
        Fixture {
            hal,
            registry,
            guard,
        }
    }

    fn send(f: &Fixture, text: &str) -> Result<UnitId, SendFailure> {
        let mut record =
            build::<_, 64>(&f.hal, &f.registry, crate::Level::INFO, format_args!("{}", text))
                .unwrap();
        f.guard.send(&f.hal, &f.registry, &mut record)
    }

    fn flags_of(bytes: &[u8]) -> RecordFlags {
        wire::decode(bytes).unwrap().header.flags
    }

    #[test]
    fn test_send_delivers_to_current_unit() {
        let f = fixture();
        assert_eq!(send(&f, "hi"), Ok(UnitId(1)));

        let received = f.hal.received(1);
        assert_eq!(received.len(), 1);
        assert_eq!(wire::decode(&received[0]).unwrap().text(), b"hi");
    }

    #[test]
    fn test_failure_arms_drop_for_next_record_only() {
        let f = fixture();
        f.hal.fail_next_enqueues(1);

        let failure = send(&f, "a").unwrap_err();
        assert_eq!(failure.error, HalError::NoBufferSpace);
        assert_eq!(failure.unit, UnitId(1));
        assert!(f.guard.drop_pending());

        send(&f, "b").unwrap();
        send(&f, "c").unwrap();
        assert!(!f.guard.drop_pending());

        let received = f.hal.received(1);
        assert_eq!(received.len(), 2);
        assert!(flags_of(&received[0]).contains(RecordFlags::DROPPED));
        assert!(!flags_of(&received[1]).contains(RecordFlags::DROPPED));
    }

    #[test]
    fn test_consecutive_failures_report_once() {
        let f = fixture();
        f.hal.fail_next_enqueues(2);

        assert!(send(&f, "a").is_err());
        assert!(send(&f, "b").is_err());
        send(&f, "c").unwrap();
        send(&f, "d").unwrap();

        let received = f.hal.received(1);
        assert!(flags_of(&received[0]).contains(RecordFlags::DROPPED));
        assert!(flags_of(&received[1]).is_empty());
    }

    #[test]
    fn test_detached_between_check_and_send() {
        let f = fixture();
        let mut record =
            build::<_, 64>(&f.hal, &f.registry, crate::Level::INFO, format_args!("late")).unwrap();

        f.registry.on_disconnect(UnitId(1));
        let failure = f.guard.send(&f.hal, &f.registry, &mut record).unwrap_err();

        assert_eq!(failure.unit, UnitId::NONE);
        assert_eq!(failure.error, HalError::NotConnected);
        assert_eq!(f.hal.enqueue_attempts(), 0);
        assert!(f.guard.drop_pending());
    }

    #[test]
    fn test_send_after_uninstall_leaves_no_drop() {
        let f = fixture();
        f.hal.fail_next_enqueues(1);
        assert!(send(&f, "a").is_err());
        assert!(f.guard.drop_pending());

        f.guard.uninstall();
        assert!(!f.guard.drop_pending());

        // A producer that built its record before the channel went away
        let failure = send(&f, "late").unwrap_err();
        assert_eq!(failure.error, HalError::NotConnected);
        assert!(!f.guard.drop_pending());
        assert_eq!(f.hal.enqueue_attempts(), 1);
    }

    #[test]
    fn test_drop_memory() {
        let mut drops = DropMemory::default();
        assert!(drops.take().is_empty());

        drops.arm();
        drops.arm();
        assert!(drops.is_armed());
        assert_eq!(drops.take(), RecordFlags::DROPPED);
        assert!(drops.take().is_empty());
    }

    #[test]
    fn test_install_once() {
        let guard = DeliveryGuard::new();
        assert!(guard.install(NumericControlRef(1)));
        assert!(!guard.install(NumericControlRef(2)));
        assert_eq!(guard.control(), Some(NumericControlRef(1)));

        assert_eq!(guard.uninstall(), Some(NumericControlRef(1)));
        assert_eq!(guard.control(), None);
    }
}
