//! Logging setup for the Wirelens binary
//!
//! Logs go to stderr so stdout only carries live lines and the final report.
//! `RUST_LOG`, when set, overrides the configured level.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};
use wirelens_core::{Error, Result};

use crate::config::LoggingConfig;

/// Log line layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line without module targets
    Compact,
}

impl LogFormat {
    /// Parse a format name, falling back to `Pretty` for anything unrecognised
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

fn level_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level.trim()).map_err(|e| Error::InvalidConfig {
        key: "logging.level".into(),
        message: e.to_string(),
    })
}

fn stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = fmt::layer().with_writer(std::io::stderr);
    match format {
        LogFormat::Json => layer.json().boxed(),
        LogFormat::Compact => layer.compact().with_target(false).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

/// Install the global subscriber described by the `[logging]` settings.
///
/// Fails if the level does not parse or a subscriber is already installed.
pub fn init_logging(settings: &LoggingConfig) -> Result<()> {
    let filter = level_filter(&settings.level)?;

    tracing_subscriber::registry()
        .with(stderr_layer(LogFormat::from_name(&settings.format)))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Configuration(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_name() {
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name(" compact "), LogFormat::Compact);
        assert_eq!(LogFormat::from_name("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name("bogus"), LogFormat::Pretty);
    }

    #[test]
    fn test_init_logging_once() {
        let settings = LoggingConfig {
            level: "debug".into(),
            format: "compact".into(),
        };
        assert!(init_logging(&settings).is_ok());

        let again = init_logging(&settings).unwrap_err();
        assert!(matches!(again, Error::Configuration(_)));
    }
}
