//! Tracing integration for structured logging.
//!
//! Both binaries share one setup path: a verbosity count, an optional log
//! file, and a text or JSON format.

use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::Result;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// Structured JSON output.
    Json,
}

fn default_filter(verbosity: u8) -> EnvFilter {
    let level = match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        3 => "debug",
        _ => "trace",
    };

    // RUST_LOG takes precedence when set.
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "haul_core={level},haul_sender={level},haul_receiver={level}"
        ))
    })
}

/// Initialize the logging system.
///
/// `verbosity` maps 0..=4 to error..=trace; `log_file` redirects output from
/// stderr to a file (appending); `format` selects text or JSON lines.
pub fn init_logging(verbosity: u8, log_file: Option<&Path>, format: LogFormat) -> Result<()> {
    let filter = default_filter(verbosity);
    let detail = verbosity >= 3;

    let registry = tracing_subscriber::registry().with(filter);

    let init_result = match (log_file, format) {
        (None, LogFormat::Text) => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(detail)
                    .with_line_number(detail),
            )
            .try_init(),
        (None, LogFormat::Json) => registry.with(fmt::layer().json()).try_init(),
        (Some(path), LogFormat::Text) => {
            let file = open_log_file(path)?;
            registry
                .with(
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(detail)
                        .with_line_number(detail),
                )
                .try_init()
        }
        (Some(path), LogFormat::Json) => {
            let file = open_log_file(path)?;
            registry.with(fmt::layer().json().with_writer(file)).try_init()
        }
    };

    init_result.map_err(|e| crate::Error::Io(std::io::Error::other(e.to_string())))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?)
}

/// Initialize logging with defaults for testing.
///
/// Silently ignores errors (the subscriber may already be installed).
pub fn init_test_logging() {
    let _ = init_logging(2, None, LogFormat::Text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn init_is_idempotent_in_tests() {
        init_test_logging();
        init_test_logging();
    }
}
