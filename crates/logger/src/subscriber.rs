use std::env::{VarError, var};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const FORMAT_ENV: &str = "RUST_LOG_FORMAT";

/// Output format of log lines, picked with `RUST_LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    fn from_env() -> (Self, Option<VarError>) {
        match var(FORMAT_ENV) {
            Ok(value) => (Self::parse(&value), None),
            Err(VarError::NotPresent) => (Self::default(), None),
            Err(error) => (Self::default(), Some(error)),
        }
    }
}

pub fn init() {
    init_with_level(LevelFilter::INFO);
}

/// Initialize the tracing subscriber with `level` as the default directive.
///
/// `RUST_LOG` overrides the level. Logs go to stderr so stdout stays free
/// for command output. Calling this twice is a no-op.
pub fn init_with_level(level: LevelFilter) {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let (log_format, format_error) = LogFormat::from_env();

    let log_layer = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        return;
    }

    if let Some(error) = format_error {
        tracing::warn!("Failed to read {FORMAT_ENV}, falling back to compact: {error}");
    }
}
