//! Capture error types

use std::path::PathBuf;

use thiserror::Error;

/// Hint shown with permission failures when opening an interface
pub const PRIVILEGE_HINT: &str =
    "root/administrator privileges (or CAP_NET_RAW) are required to capture packets";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Invalid capture configuration: {0}")]
    Configuration(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Permission denied opening '{interface}': {hint}")]
    PermissionDenied { interface: String, hint: String },

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Failed to open capture channel: {0}")]
    ChannelOpen(String),

    #[error("Cannot read capture file {path:?}: {message}")]
    InvalidCaptureFile { path: PathBuf, message: String },

    #[error("Capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write capture file {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Coarse failure classes callers react to differently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before the session starts
    Configuration,
    /// Interface needs privileges the process lacks
    Permission,
    /// Opening or reading the capture source failed
    Capture,
    /// Capture file could not be written
    Persistence,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::Configuration(_) | CaptureError::InvalidFilter(_) => {
                ErrorKind::Configuration
            }
            CaptureError::PermissionDenied { .. } => ErrorKind::Permission,
            CaptureError::InterfaceNotFound(_)
            | CaptureError::ChannelOpen(_)
            | CaptureError::InvalidCaptureFile { .. }
            | CaptureError::Io(_) => ErrorKind::Capture,
            CaptureError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    pub(crate) fn permission_denied(interface: impl Into<String>) -> Self {
        CaptureError::PermissionDenied {
            interface: interface.into(),
            hint: PRIVILEGE_HINT.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CaptureError::InvalidFilter("x".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CaptureError::permission_denied("eth0").kind(),
            ErrorKind::Permission
        );
        assert_eq!(
            CaptureError::InterfaceNotFound("eth9".into()).kind(),
            ErrorKind::Capture
        );
        let persist = CaptureError::Persistence {
            path: PathBuf::from("/nope/out.pcap"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(persist.kind(), ErrorKind::Persistence);
    }

    #[test]
    fn test_permission_message_has_hint() {
        let msg = CaptureError::permission_denied("eth0").to_string();
        assert!(msg.contains("eth0"));
        assert!(msg.contains("privileges"));
    }
}
