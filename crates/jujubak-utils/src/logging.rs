/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Jujubak Logging Module
//!
//! This module provides the logging framework shared by the jujubak crates.
//!
//! ## Features
//! - Thread-safe logging
//! - Dynamic log level adjustment
//! - Text or JSON output formats
//!
//! ## Usage
//!
//! 1. Initialize the logger:
//!    ```ignore
//!    jujubak_utils::logging::init("info").expect("Failed to initialize logger");
//!    ```
//!
//! 2. Use the log macros throughout your code:
//!    ```ignore
//!    info!("This is an info message");
//!    ```
//!
//! 3. Update log level at runtime if needed (the scheduled run flips to
//!    "debug" when invoked with `--debug`):
//!    ```ignore
//!    jujubak_utils::logging::update_log_level("debug").expect("Failed to update log level");
//!    ```

use log::{LevelFilter, Metadata, Record, SetLoggerError};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub use log::{debug, error, info, trace, warn};

static LOGGER: JujubakLogger = JujubakLogger;
static CURRENT_LEVEL: AtomicUsize = AtomicUsize::new(LevelFilter::Info as usize);
static JSON_FORMAT: AtomicBool = AtomicBool::new(false);
static INIT: OnceCell<()> = OnceCell::new();

/// Custom logger for the jujubak crates
pub struct JujubakLogger;

impl log::Log for JujubakLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level()
            <= level_filter_from_u8(CURRENT_LEVEL.load(Ordering::Relaxed).try_into().unwrap())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            if JSON_FORMAT.load(Ordering::Relaxed) {
                // JSON structured logging format
                let log_entry = serde_json::json!({
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                    "level": record.level().to_string().to_lowercase(),
                    "target": record.target(),
                    "message": format!("{}", record.args()),
                    "module": record.module_path(),
                    "file": record.file(),
                    "line": record.line()
                });
                eprintln!("{}", log_entry);
            } else {
                // Human-readable text format
                eprintln!(
                    "{} - {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {}
}

/// Initializes the logging system with the specified log level and the
/// human-readable text format.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    init_with_format(level, "text")
}

/// Initializes the logging system with the specified log level and format.
///
/// # Arguments
/// * `level` - String representation of the log level ("debug", "info", "warn", "error")
/// * `format` - Log output format ("text" for human-readable, "json" for structured JSON)
pub fn init_with_format(level: &str, format: &str) -> Result<(), SetLoggerError> {
    let level_filter = str_to_level_filter(level);
    let use_json = format.eq_ignore_ascii_case("json");

    INIT.get_or_init(|| {
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(LevelFilter::Trace))
            .expect("Failed to set logger");
    });

    JSON_FORMAT.store(use_json, Ordering::Relaxed);
    CURRENT_LEVEL.store(level_filter as usize, Ordering::Relaxed);
    log::set_max_level(level_filter);
    Ok(())
}

/// Updates the current log level.
///
/// Unknown level strings fall back to "info".
pub fn update_log_level(level: &str) -> Result<(), String> {
    let new_level = str_to_level_filter(level);
    CURRENT_LEVEL.store(new_level as usize, Ordering::Relaxed);
    log::set_max_level(new_level);
    Ok(())
}

fn str_to_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn level_filter_from_u8(v: u8) -> LevelFilter {
    match v {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        5 => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

pub mod prelude {
    pub use log::{debug, error, info, trace, warn};
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;
    use serial_test::serial;
    use std::thread;

    #[test]
    #[serial]
    /// Verifies that the logger initializes correctly with the specified log level.
    fn test_init() {
        assert!(init("info").is_ok());
        assert_eq!(
            CURRENT_LEVEL.load(Ordering::Relaxed),
            LevelFilter::Info as usize
        );
    }

    #[test]
    #[serial]
    /// Tests the ability to update the log level after initialization.
    fn test_update_log_level() {
        init("info").expect("Failed to initialize logger");

        assert!(update_log_level("debug").is_ok());
        assert_eq!(
            CURRENT_LEVEL.load(Ordering::Relaxed),
            LevelFilter::Debug as usize
        );

        assert!(update_log_level("warn").is_ok());
        assert_eq!(
            CURRENT_LEVEL.load(Ordering::Relaxed),
            LevelFilter::Warn as usize
        );
    }

    #[test]
    #[serial]
    /// Checks the logger's behavior when given invalid log levels.
    fn test_invalid_log_level() {
        assert!(init("invalid_level").is_ok());
        assert_eq!(
            CURRENT_LEVEL.load(Ordering::Relaxed),
            LevelFilter::Info as usize
        );

        assert!(update_log_level("another_invalid_level").is_ok());
        assert_eq!(
            CURRENT_LEVEL.load(Ordering::Relaxed),
            LevelFilter::Info as usize
        );
    }

    #[test]
    #[serial]
    /// Ensures that all log macros can be called without errors.
    #[allow(clippy::assertions_on_constants)]
    fn test_log_macros() {
        init("debug").expect("Failed to initialize logger");

        debug!("This is a debug message");
        info!("This is an info message");
        warn!("This is a warning message");
        error!("This is an error message");

        assert!(true);
    }

    #[test]
    #[serial]
    /// Concurrent logging and level changes must not deadlock or panic.
    fn test_thread_safety() {
        init("info").expect("Failed to initialize logger");

        let threads: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    for n in 0..1000 {
                        if n % 7 == 0 {
                            let level = match i % 4 {
                                0 => "error",
                                1 => "warn",
                                2 => "debug",
                                _ => "info",
                            };
                            update_log_level(level).expect("Failed to update log level");
                        } else {
                            info!("Test message {} from thread {}", n, i);
                        }
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().expect("Thread panicked");
        }
    }
}
