//! Configuration management for Wirelens components

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use wirelens_core::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Capture session settings
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Report output settings
    #[serde(default)]
    pub output: OutputSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Merge with environment variables (WIRELENS_ prefix)
    pub fn merge_env(self) -> Result<Self> {
        self.merge_vars(|key| std::env::var(key).ok())
    }

    /// Merge values from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values are rejected rather than ignored.
    pub fn merge_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Capture settings
        if let Some(val) = lookup("WIRELENS_INTERFACE") {
            self.capture.interface = Some(val);
        }
        if let Some(val) = lookup("WIRELENS_FILTER") {
            self.capture.filter = Some(val);
        }
        if let Some(val) = lookup("WIRELENS_COUNT") {
            self.capture.count = parse_var("WIRELENS_COUNT", &val)?;
        }
        if let Some(val) = lookup("WIRELENS_TIMEOUT") {
            self.capture.timeout_secs = Some(parse_var("WIRELENS_TIMEOUT", &val)?);
        }
        if let Some(val) = lookup("WIRELENS_PCAP") {
            self.capture.pcap = Some(val);
        }
        if let Some(val) = lookup("WIRELENS_QUIET") {
            self.capture.quiet = matches!(val.as_str(), "1" | "true" | "yes");
        }

        // Output
        if let Some(val) = lookup("WIRELENS_OUTPUT") {
            self.output.format = OutputFormat::from_name(&val).ok_or_else(|| {
                Error::InvalidConfig {
                    key: "WIRELENS_OUTPUT".into(),
                    message: format!("unknown output format '{}'", val),
                }
            })?;
        }

        // Logging
        if let Some(val) = lookup("WIRELENS_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("WIRELENS_LOG_FORMAT") {
            self.logging.format = val;
        }

        Ok(self)
    }

    /// Check value ranges that the TOML types alone cannot express
    pub fn validate(&self) -> Result<()> {
        self.capture.timeout()?;
        if self.capture.read_timeout_ms == 0 {
            return Err(Error::InvalidConfig {
                key: "capture.read_timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.trim().parse().map_err(|_| Error::InvalidConfig {
        key: key.into(),
        message: format!("cannot parse '{}'", val),
    })
}

/// Capture session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Interface name; the system default is used when unset
    pub interface: Option<String>,

    /// Filter expression (e.g. "tcp port 443" or "arp")
    pub filter: Option<String>,

    /// Stop after this many frames (0 = unbounded)
    #[serde(default)]
    pub count: u64,

    /// Stop after this many seconds
    pub timeout_secs: Option<f64>,

    /// Path of a pcap file to write the captured frames to
    pub pcap: Option<String>,

    /// Suppress the live per-frame line
    #[serde(default)]
    pub quiet: bool,

    /// Enable promiscuous mode on the interface
    #[serde(default)]
    pub promiscuous: bool,

    /// Read poll interval of the live source in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_read_timeout_ms() -> u64 {
    100
}

impl CaptureSettings {
    /// Time budget as a `Duration`.
    ///
    /// Rejects budgets that are not positive or do not fit a `Duration`.
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(secs) = self.timeout_secs else {
            return Ok(None);
        };
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) if !duration.is_zero() => Ok(Some(duration)),
            _ => Err(Error::InvalidConfig {
                key: "capture.timeout_secs".into(),
                message: format!("{} is not a usable number of seconds", secs),
            }),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            interface: None,
            filter: None,
            count: 0,
            timeout_secs: None,
            pcap: None,
            quiet: false,
            promiscuous: false,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Final report format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    String::from("warn")
}

fn default_log_format() -> String {
    String::from("pretty")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Builder for constructing Config
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.config.capture.interface = Some(name.into());
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.config.capture.filter = Some(expr.into());
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.config.capture.count = count;
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.config.capture.timeout_secs = Some(secs);
        self
    }

    pub fn pcap(mut self, path: impl Into<String>) -> Self {
        self.config.capture.pcap = Some(path.into());
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.config.capture.quiet = quiet;
        self
    }

    pub fn output(mut self, format: OutputFormat) -> Self {
        self.config.output.format = format;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            [capture]
            interface = "eth0"
            filter = "tcp port 443"
            count = 25
            timeout_secs = 2.5
            pcap = "/tmp/out.pcap"

            [output]
            format = "json"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.capture.interface.as_deref(), Some("eth0"));
        assert_eq!(config.capture.filter.as_deref(), Some("tcp port 443"));
        assert_eq!(config.capture.count, 25);
        assert_eq!(config.capture.timeout_secs, Some(2.5));
        assert_eq!(config.capture.read_timeout_ms, 100);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_count_rejected() {
        let err = Config::from_toml("[capture]\ncount = -1\n").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_timeout() {
        let config = Config::builder().timeout_secs(0.0).build();
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { ref key, .. }) if key == "capture.timeout_secs"
        ));

        let config = Config::builder().timeout_secs(-3.0).build();
        assert!(config.validate().is_err());

        let config = Config::builder().timeout_secs(f64::NAN).build();
        assert!(config.validate().is_err());

        // Larger than any Duration
        let config = Config::builder().timeout_secs(1e20).build();
        assert!(config.validate().is_err());

        let config = Config::builder().timeout_secs(0.5).build();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.capture.timeout().unwrap(),
            Some(Duration::from_millis(500))
        );
        assert_eq!(Config::default().capture.timeout().unwrap(), None);
    }

    #[test]
    fn test_merge_vars() {
        let vars: HashMap<&str, &str> = [
            ("WIRELENS_INTERFACE", "wlan0"),
            ("WIRELENS_COUNT", "10"),
            ("WIRELENS_TIMEOUT", "1.5"),
            ("WIRELENS_QUIET", "true"),
            ("WIRELENS_OUTPUT", "json"),
        ]
        .into_iter()
        .collect();

        let config = Config::default()
            .merge_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.capture.interface.as_deref(), Some("wlan0"));
        assert_eq!(config.capture.count, 10);
        assert_eq!(config.capture.timeout_secs, Some(1.5));
        assert!(config.capture.quiet);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_merge_vars_rejects_garbage() {
        let err = Config::default()
            .merge_vars(|k| (k == "WIRELENS_COUNT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { ref key, .. } if key == "WIRELENS_COUNT"));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("wirelens.toml");
        std::fs::write(&path, "[capture]\nquiet = true\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.capture.quiet);

        let missing = Config::from_file(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_config_builder() {
        let config = Config::builder()
            .interface("lo")
            .filter("arp")
            .count(3)
            .pcap("out.pcap")
            .quiet(true)
            .output(OutputFormat::Json)
            .log_level("info")
            .build();

        assert_eq!(config.capture.interface.as_deref(), Some("lo"));
        assert_eq!(config.capture.filter.as_deref(), Some("arp"));
        assert_eq!(config.capture.count, 3);
        assert_eq!(config.capture.pcap.as_deref(), Some("out.pcap"));
        assert!(config.capture.quiet);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.logging.level, "info");
    }
}
