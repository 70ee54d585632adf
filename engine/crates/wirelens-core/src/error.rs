//! Error types for the Wirelens engine

use thiserror::Error;

/// Result type alias using Wirelens Error
pub type Result<T> = std::result::Result<T, Error>;

/// Setup errors raised before a capture starts
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::InvalidConfig {
            key: "capture.timeout_secs".into(),
            message: "must be positive".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for capture.timeout_secs: must be positive"
        );

        let err = Error::FileNotFound {
            path: "/etc/wirelens.toml".into(),
        };
        assert_eq!(err.to_string(), "File not found: /etc/wirelens.toml");
    }
}
