#![deny(missing_docs)]
//! Shared logging utilities for the scraper workspace.
//!
//! This crate provides the `scrape_*` logging macros used by the engine, the
//! controller and the app, plus a minimal test initializer for the global
//! logger. Diagnostics go through the `log` facade; user-facing progress text
//! travels over the scrape event channel instead.

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_trace {
    ($($arg:tt)*) => {{
        log::trace!($($arg)*);
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_debug {
    ($($arg:tt)*) => {{
        log::debug!($($arg)*);
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_info {
    ($($arg:tt)*) => {{
        log::info!($($arg)*);
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_warn {
    ($($arg:tt)*) => {{
        log::warn!($($arg)*);
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! scrape_error {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
    }};
}

/// Maps a verbosity name (`trace`, `debug`, `info`, `warn`, `error`, `off`)
/// to a level filter, falling back to `Info` for anything unrecognised.
pub fn level_from_name(name: &str) -> log::LevelFilter {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "warn" | "warning" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    }
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Another test in the same binary may have won the race.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
