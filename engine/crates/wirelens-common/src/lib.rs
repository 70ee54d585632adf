//! Wirelens Common - Shared utilities: logging and configuration
//!
//! This crate provides common functionality used across all Wirelens crates.

pub mod config;
pub mod logging;

pub use config::{CaptureSettings, Config, ConfigBuilder, LoggingConfig, OutputFormat};
pub use logging::{init_logging, LogFormat};
