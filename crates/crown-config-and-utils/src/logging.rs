//! Logging initialization for the client.
//!
//! Thin wrapper over `crown-observability`: structured JSONL goes to
//! `~/.crown/logs/client.jsonl`, with an optional stderr mirror.

use crate::Paths;
use crown_observability::LogConfig;

/// Initialize the logging system.
///
/// * `service_name` - Component name attached to every line
/// * `level` - Default log level, overridden by `RUST_LOG`
/// * `also_stderr` - Mirror logs to stderr
pub fn init_logging(service_name: &str, level: &str, paths: &Paths, also_stderr: bool) {
    crown_observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
