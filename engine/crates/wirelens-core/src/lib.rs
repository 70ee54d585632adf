//! Wirelens Core - Foundation types and error handling
//!
//! This crate provides the core abstractions used throughout the Wirelens engine:
//! - `RawFrame`: A captured link-layer frame with its timestamp and wire length
//! - `PacketSnapshot`: The structured, serializable summary of one frame
//! - `Protocol`: Protocol tags assigned by the classifier
//! - `Error`: Workspace-level error type

pub mod error;
pub mod frame;
pub mod protocol;
pub mod snapshot;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use frame::RawFrame;
pub use protocol::Protocol;
pub use snapshot::{PacketSnapshot, TIMESTAMP_FORMAT, UNKNOWN_ADDRESS};
