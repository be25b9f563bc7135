//! Logging initialization using the `tracing` ecosystem.
//!
//! - Console output on stderr (colored), so stdout stays free for command
//!   results
//! - Optional file output as JSON lines, rotated daily by `tracing-appender`
//! - Level from `RUST_LOG` when set, otherwise the explicit parameter
//!
//! Access tokens and secrets must only be logged through [`redact`].

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Call once at program start, before the first request is issued. A second
/// call leaves the existing subscriber in place.
///
/// # Parameters
///
/// - `log_level`: default level if `RUST_LOG` env var is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: used as the log file prefix (e.g. `"kis-runner"`)
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .json()
            .with_writer(tracing_appender::rolling::daily(dir, module_name))
            .with_ansi(false)
            .with_current_span(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Shorten a secret-bearing string for log output (first 8 chars).
pub fn redact(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(8)
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_keeps_prefix_only() {
        assert_eq!(redact("abcdefghijklmnop"), "abcdefgh");
        assert_eq!(redact("short"), "short");
        assert_eq!(redact(""), "");
    }
}
