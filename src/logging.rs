//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for TTY / local dev). Format
//! is auto-detected from the terminal but can be forced via `--json`
//! or `--pretty`. With the `sentry-integration` feature, events are also
//! forwarded to Sentry.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Kafka client logs are noisy below `warn`. `rdkafka` emits them through
/// `tracing` under its module paths, and forwards librdkafka's own log
/// callback under the `librdkafka` target.
fn filter(level: &LogLevel) -> Targets {
    Targets::new()
        .with_default(level.to_tracing_level())
        .with_target("rdkafka", tracing::Level::WARN)
        .with_target("librdkafka", tracing::Level::WARN)
}

pub fn init(level: &LogLevel, format: LogFormat) {
    let registry = tracing_subscriber::registry().with(filter(level));

    #[cfg(feature = "sentry-integration")]
    let registry = registry.with(sentry_tracing::layer());

    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(false)).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_wins() {
        assert_eq!(resolve_format(false, true), LogFormat::Json);
        assert_eq!(resolve_format(true, false), LogFormat::Pretty);
    }

    #[test]
    fn rdkafka_target_is_capped_at_warn() {
        let targets = filter(&LogLevel::Debug);
        assert!(targets.would_enable("matchbridge::bridge", &tracing::Level::DEBUG));
        assert!(!targets.would_enable("rdkafka::client", &tracing::Level::INFO));
        assert!(targets.would_enable("rdkafka::client", &tracing::Level::WARN));
        assert!(!targets.would_enable("librdkafka", &tracing::Level::INFO));
        assert!(targets.would_enable("librdkafka", &tracing::Level::ERROR));
    }
}
