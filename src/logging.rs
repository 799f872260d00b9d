//! Tracing subscriber setup.
//!
//! Logs never go to stdout, which carries the stdio transport's protocol
//! stream.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Parses a log level name, falling back to `INFO` for unknown names.
#[must_use]
pub fn parse_log_level(level: &str) -> Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Opens `path` for appending, creating it if needed.
///
/// # Errors
///
/// Returns [`ConfigError::LogFile`] if the file cannot be opened.
pub fn open_log_file(path: &Path) -> Result<File, ConfigError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ConfigError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` directives are honoured in addition to `level`. Output goes to
/// `log_file` when set, otherwise to stderr.
///
/// # Errors
///
/// Returns [`ConfigError::LogFile`] if the log file cannot be opened.
pub fn init_tracing(level: Level, log_file: Option<&Path>) -> Result<(), ConfigError> {
    let builder = subscriber_builder(level);

    match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Event targets stay visible so `--log-command` traffic on the
/// `skywalking_mcp::io` target can be told apart from other logs.
fn subscriber_builder(level: Level) -> SubscriberBuilder<DefaultFields, Format, EnvFilter> {
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
}
