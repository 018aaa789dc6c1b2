//! Pipeline progress logging.
//!
//! Progress is reported through four helpers (`log_info`, `log_success`,
//! `log_warning`, `log_error`) that emit `tracing` events under the
//! `medallion` target. [`init`] installs the stderr subscriber used by the
//! binary; library users bring their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "medallion=info";

/// Severity of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Emit one progress message, indented by `indent` levels.
pub fn log(level: LogLevel, indent: u8, msg: impl Into<String>) {
    let msg = msg.into();
    let pad = "  ".repeat(indent as usize);
    match level {
        LogLevel::Info => tracing::info!(target: "medallion", "{}{}", pad, msg),
        LogLevel::Success => tracing::info!(target: "medallion", outcome = "ok", "{}{}", pad, msg),
        LogLevel::Warning => tracing::warn!(target: "medallion", "{}{}", pad, msg),
        LogLevel::Error => tracing::error!(target: "medallion", "{}{}", pad, msg),
    }
}

pub fn log_info(msg: impl Into<String>) {
    log(LogLevel::Info, 0, msg);
}

pub fn log_success(msg: impl Into<String>) {
    log(LogLevel::Success, 0, msg);
}

pub fn log_warning(msg: impl Into<String>) {
    log(LogLevel::Warning, 0, msg);
}

pub fn log_error(msg: impl Into<String>) {
    log(LogLevel::Error, 0, msg);
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    log(LogLevel::Info, indent, msg);
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    log(LogLevel::Warning, indent, msg);
}

/// Install the global subscriber: `RUST_LOG` (or [`DEFAULT_FILTER`]) on
/// stderr, as JSON lines when `json` is set.
///
/// A second call is a no-op.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let _ = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        init(true);
        log_info("still logging");
        log_warning_indent("nested", 2);
    }
}
