//! Packet snapshots - the durable per-frame record produced by a capture

use serde::{Deserialize, Serialize};

/// Sentinel used for addresses that could not be determined
pub const UNKNOWN_ADDRESS: &str = "-";

/// Timestamp layout of [`PacketSnapshot::timestamp`]
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Serializable summary of one captured frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketSnapshot {
    /// Capture time, microsecond precision
    pub timestamp: String,

    /// Source address, or `"-"`
    #[serde(rename = "src")]
    pub source: String,

    /// Destination address, or `"-"`
    #[serde(rename = "dst")]
    pub destination: String,

    /// Uppercase protocol tag, or `"unknown"`
    pub protocol: String,

    /// Wire length in bytes
    pub length: u32,

    /// One-line protocol-specific description
    pub summary: String,
}

impl PacketSnapshot {
    /// Whether both endpoints were resolved to addresses
    pub fn has_addresses(&self) -> bool {
        self.source != UNKNOWN_ADDRESS && self.destination != UNKNOWN_ADDRESS
    }
}
