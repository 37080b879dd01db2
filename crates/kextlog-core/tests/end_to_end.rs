//! End-to-end logger tests
//!
//! Drive a registered [`Logger`] through the mock control channel and check
//! what the observer receives and what reaches the console.

use std::sync::Arc;

use kextlog_core::{decode, Level, Logger, LoggerConfig, RecordFlags, HEADER_LEN};
use kextlog_hal::HalError;
use kextlog_hal_mock::MockHal;

/// Stack record with room for 15 text bytes plus the terminator
const SMALL: usize = HEADER_LEN + 16;
const TEXT_CAP: usize = SMALL - HEADER_LEN;

fn small_logger() -> Arc<Logger<MockHal, SMALL>> {
    Arc::new(Logger::new(MockHal::new(), LoggerConfig::default()).unwrap())
}

fn attached_logger(unit: u32) -> Arc<Logger<MockHal, SMALL>> {
    let logger = small_logger();
    logger.register().unwrap();
    logger.hal().simulate_connect(unit).unwrap();
    logger.hal().clear_console_log();
    logger
}

fn texts(records: &[Vec<u8>]) -> Vec<String> {
    records
        .iter()
        .map(|raw| decode(raw).unwrap().text_lossy().into_owned())
        .collect()
}

// ============================================================================
// Fallback without an observer
// ============================================================================

#[test]
fn test_no_observer_goes_to_console() {
    let logger = small_logger();
    logger.register().unwrap();
    logger.hal().clear_console_log();

    logger.log(Level::INFO, format_args!("x={}", 5));

    assert_eq!(logger.hal().get_console_log(), vec!["x=5"]);
    assert_eq!(logger.hal().enqueue_attempts(), 0);
    assert_eq!(logger.hal().total_allocations(), 0);
    assert_eq!(logger.stats().fallback, 1);
    assert_eq!(logger.stats().delivered, 0);
}

#[test]
fn test_unregistered_logger_goes_to_console() {
    let logger = small_logger();
    logger.log(Level::ERROR, format_args!("early"));
    assert_eq!(logger.hal().get_console_log(), vec!["early"]);
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn test_short_message_delivered() {
    let logger = attached_logger(1);
    logger.hal().set_time(42);

    logger.log(Level::WARN, format_args!("hello"));

    let received = logger.hal().received(1);
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].len(), HEADER_LEN + 6);

    let record = decode(&received[0]).unwrap();
    assert_eq!(record.header.size, 6);
    assert_eq!(record.header.level, Level::WARN);
    assert_eq!(record.header.flags, RecordFlags::empty());
    assert_eq!(record.header.timestamp, 42);
    assert_eq!(record.text(), b"hello");

    assert_eq!(logger.hal().console_count(), 0);
    assert_eq!(logger.stats().delivered, 1);
}

#[test]
fn test_message_filling_inline_capacity() {
    let logger = attached_logger(1);
    let text = "a".repeat(TEXT_CAP - 1);

    logger.log(Level::INFO, format_args!("{}", text));

    let record_bytes = logger.hal().take_received(1);
    let record = decode(&record_bytes[0]).unwrap();
    assert_eq!(record.header.size as usize, TEXT_CAP);
    assert!(!record.is_truncated());
    assert_eq!(logger.hal().total_allocations(), 0);
}

#[test]
fn test_oversize_message_delivered_whole() {
    let logger = attached_logger(1);
    let text = "0123456789abcdefghijklmnopqrstuvwxyz";

    logger.log(Level::DEBUG, format_args!("{}", text));

    let received = logger.hal().received(1);
    let record = decode(&received[0]).unwrap();
    assert_eq!(record.header.size as usize, text.len() + 1);
    assert!(!record.is_truncated());
    assert_eq!(record.text_lossy(), text);

    assert_eq!(logger.hal().total_allocations(), 1);
    assert_eq!(logger.hal().live_allocations(), 0);
}

#[test]
fn test_one_byte_over_capacity_uses_heap() {
    let logger = attached_logger(1);
    let text = "b".repeat(TEXT_CAP);

    logger.log(Level::INFO, format_args!("{}", text));

    let record_bytes = logger.hal().take_received(1);
    let record = decode(&record_bytes[0]).unwrap();
    assert_eq!(record.text_lossy(), text);
    assert_eq!(logger.hal().total_allocations(), 1);
}

#[test]
fn test_allocation_failure_truncates() {
    let logger = attached_logger(1);
    logger.hal().set_allocation_failure(true);
    let text = "0123456789abcdefghijklmnopqrstuvwxyz";

    logger.log(Level::INFO, format_args!("{}", text));

    let received = logger.hal().received(1);
    assert_eq!(received[0].len(), SMALL);

    let record = decode(&received[0]).unwrap();
    assert!(record.is_truncated());
    assert_eq!(record.header.size as usize, TEXT_CAP);
    assert_eq!(record.text(), &text.as_bytes()[..TEXT_CAP - 1]);
    assert_eq!(logger.stats().truncated, 1);
    assert_eq!(logger.stats().delivered, 1);
}

#[test]
fn test_records_arrive_in_call_order() {
    let logger = attached_logger(1);
    for i in 0..5 {
        logger.log(Level::INFO, format_args!("m{}", i));
    }
    assert_eq!(
        texts(&logger.hal().received(1)),
        vec!["m0", "m1", "m2", "m3", "m4"]
    );
}

#[test]
fn test_custom_level_passes_through() {
    let logger = attached_logger(1);
    logger.log(Level(9), format_args!("lvl"));

    let received = logger.hal().received(1);
    assert_eq!(decode(&received[0]).unwrap().header.level, Level(9));
}

// ============================================================================
// Drop notification
// ============================================================================

#[test]
fn test_single_failure_marks_next_record() {
    let logger = attached_logger(1);
    logger.hal().fail_next_enqueues(1);

    logger.log(Level::INFO, format_args!("a"));
    assert!(logger.drop_pending());

    let console = logger.hal().get_console_log();
    assert_eq!(console.len(), 2);
    assert!(console[0].contains("enqueue failed  unit: 1"));
    assert!(console[0].contains(&format!("errno: {}", HalError::NoBufferSpace.errno())));
    assert_eq!(console[1], "a");

    logger.log(Level::INFO, format_args!("b"));
    logger.log(Level::INFO, format_args!("c"));

    let received = logger.hal().received(1);
    assert_eq!(texts(&received), vec!["b", "c"]);
    assert!(decode(&received[0]).unwrap().is_after_drop());
    assert!(!decode(&received[1]).unwrap().is_after_drop());
    assert!(!logger.drop_pending());

    let stats = logger.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.delivered, 2);
    assert_eq!(stats.fallback, 1);
}

#[test]
fn test_consecutive_failures_report_once() {
    let logger = attached_logger(1);
    logger.hal().fail_next_enqueues(2);

    logger.log(Level::INFO, format_args!("a"));
    logger.log(Level::INFO, format_args!("b"));
    logger.log(Level::INFO, format_args!("c"));
    logger.log(Level::INFO, format_args!("d"));

    let received = logger.hal().received(1);
    assert_eq!(texts(&received), vec!["c", "d"]);
    assert!(decode(&received[0]).unwrap().is_after_drop());
    assert!(!decode(&received[1]).unwrap().is_after_drop());
}

#[test]
fn test_drop_flag_combines_with_truncation() {
    let logger = attached_logger(1);
    logger.hal().fail_next_enqueues(1);
    logger.log(Level::INFO, format_args!("lost"));

    logger.hal().set_allocation_failure(true);
    logger.log(Level::INFO, format_args!("{}", "z".repeat(40)));

    let received = logger.hal().received(1);
    let record = decode(&received[0]).unwrap();
    assert_eq!(
        record.header.flags,
        RecordFlags::TRUNCATED | RecordFlags::DROPPED
    );
}

// ============================================================================
// Observer lifecycle
// ============================================================================

#[test]
fn test_second_observer_refused() {
    let logger = attached_logger(1);

    assert_eq!(
        logger.hal().simulate_connect(2),
        Err(HalError::AlreadyConnected)
    );
    assert!(logger
        .hal()
        .has_console_containing("already connected  skip unit: 2"));

    logger.log(Level::INFO, format_args!("still 1"));
    assert_eq!(texts(&logger.hal().received(1)), vec!["still 1"]);
    assert!(logger.hal().received(2).is_empty());
}

#[test]
fn test_refused_unit_disconnect_is_noop() {
    let logger = attached_logger(1);
    let _ = logger.hal().simulate_connect(2);

    logger.hal().simulate_disconnect(2);

    assert_eq!(logger.registry().current_unit().get(), 1);
    assert!(!logger.hal().has_console_containing("disconnected"));
    logger.log(Level::INFO, format_args!("after"));
    assert_eq!(texts(&logger.hal().received(1)), vec!["after"]);
}

#[test]
fn test_disconnect_then_reconnect() {
    let logger = attached_logger(1);

    logger.hal().simulate_disconnect(1);
    assert!(logger.hal().has_console_containing("kctl disconnected  unit: 1"));

    logger.hal().clear_console_log();
    logger.log(Level::INFO, format_args!("nobody"));
    assert_eq!(logger.hal().get_console_log(), vec!["nobody"]);

    logger.hal().simulate_connect(3).unwrap();
    logger.log(Level::INFO, format_args!("three"));
    assert_eq!(texts(&logger.hal().received(3)), vec!["three"]);
}

#[test]
fn test_deregister_returns_to_console() {
    let logger = attached_logger(1);
    logger.deregister().unwrap();
    assert!(!logger.hal().is_registered());

    logger.hal().clear_console_log();
    logger.log(Level::INFO, format_args!("unloaded"));
    assert_eq!(logger.hal().get_console_log(), vec!["unloaded"]);
    assert_eq!(logger.stats().failed, 0);
}

#[test]
fn test_register_after_deregister() {
    let logger = attached_logger(1);
    logger.deregister().unwrap();
    logger.register().unwrap();
    logger.hal().simulate_connect(5).unwrap();

    logger.log(Level::INFO, format_args!("again"));
    assert_eq!(texts(&logger.hal().received(5)), vec!["again"]);
}
