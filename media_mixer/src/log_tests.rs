//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry, DefaultLogger formatting and custom loggers.

use crate::log::{DefaultLogger, LogEntry, LogSeverity, Logger};
use std::sync::Mutex;
use std::time::SystemTime;

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "mixer::GpuQueue".to_string(),
        message: "upload of plane 1 finished".to_string(),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_labels_are_fixed_width() {
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        assert_eq!(severity.label().len(), 5);
    }
    assert_eq!(LogSeverity::Warn.label(), "WARN ");
}

// ============================================================================
// DEFAULT LOGGER
// ============================================================================

#[test]
fn test_format_plain_without_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Info, None, None));
    assert!(line.contains("[INFO ]"));
    assert!(line.contains("[mixer::GpuQueue]"));
    assert!(line.ends_with("upload of plane 1 finished"));
}

#[test]
fn test_format_plain_with_location() {
    let line = DefaultLogger::format_plain(&entry(LogSeverity::Error, Some("queue.rs"), Some(88)));
    assert!(line.contains("[ERROR]"));
    assert!(line.ends_with("(queue.rs:88)"));
}

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("write_frame.rs"), Some(42)));
    }
}

// ============================================================================
// LOGGER TRAIT
// ============================================================================

struct CountingLogger {
    count: Mutex<usize>,
}

impl Logger for CountingLogger {
    fn log(&self, _entry: &LogEntry) {
        *self.count.lock().unwrap() += 1;
    }
}

#[test]
fn test_custom_logger_implementation() {
    let logger = CountingLogger { count: Mutex::new(0) };
    logger.log(&entry(LogSeverity::Debug, None, None));
    logger.log(&entry(LogSeverity::Warn, None, None));
    assert_eq!(*logger.count.lock().unwrap(), 2);
}

#[test]
fn test_logger_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
    assert_send_sync::<CountingLogger>();
}

#[test]
fn test_log_entry_clone() {
    let original = entry(LogSeverity::Warn, Some("queue.rs"), Some(10));
    let cloned = original.clone();
    assert_eq!(cloned.severity, original.severity);
    assert_eq!(cloned.source, original.source);
    assert_eq!(cloned.file, Some("queue.rs"));
    assert_eq!(cloned.line, Some(10));
}
