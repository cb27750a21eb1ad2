//! Logging setup for the command line tool.
//!
//! Command output goes to stdout; logs always go to stderr so the two can be
//! piped separately.

use std::io;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a `LOG_FORMAT` value; anything but `json` is pretty.
    #[must_use]
    pub fn parse_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") { Self::Json } else { Self::Pretty }
    }
}

/// Installs the global subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `default_level`.
pub fn init_logging(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);
    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => registry.with(stderr_layer).init(),
        LogFormat::Json => registry
            .with(stderr_layer.json().with_current_span(true).with_span_list(true))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_value() {
        assert_eq!(LogFormat::parse_env_value("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse_env_value("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse_env_value("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse_env_value("unknown"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse_env_value(""), LogFormat::Pretty);
    }
}
