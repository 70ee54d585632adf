//! Raw link-layer frames as delivered by a capture source

use chrono::{DateTime, Utc};

/// One captured link-layer frame.
///
/// `data` holds the captured bytes. `wire_len` is the length the frame had on
/// the wire, which can exceed `data.len()` when the capture was truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub captured_at: Option<DateTime<Utc>>,
    pub wire_len: u32,
}

impl RawFrame {
    /// Create a frame captured at `captured_at` with wire length equal to the
    /// captured length.
    pub fn new(data: impl Into<Vec<u8>>, captured_at: DateTime<Utc>) -> Self {
        let data = data.into();
        let wire_len = data.len() as u32;
        Self {
            data,
            captured_at: Some(captured_at),
            wire_len,
        }
    }

    /// Create a frame with no capture timestamp.
    pub fn untimed(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let wire_len = data.len() as u32;
        Self {
            data,
            captured_at: None,
            wire_len,
        }
    }

    /// Override the original wire length.
    pub fn with_wire_len(mut self, wire_len: u32) -> Self {
        self.wire_len = wire_len;
        self
    }

    /// Number of bytes actually captured.
    pub fn captured_len(&self) -> u32 {
        self.data.len() as u32
    }

    /// Capture time, or the Unix epoch when the source supplied none.
    pub fn timestamp_or_epoch(&self) -> DateTime<Utc> {
        self.captured_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Capture time split into (seconds, microseconds) since the epoch.
    ///
    /// Times before the epoch clamp to zero and times past the 32-bit range
    /// (early 2106) clamp to the last representable microsecond.
    pub fn timestamp_parts(&self) -> (u32, u32) {
        let ts = self.timestamp_or_epoch();
        match u32::try_from(ts.timestamp()) {
            Ok(secs) => (secs, ts.timestamp_subsec_micros().min(999_999)),
            Err(_) if ts.timestamp() < 0 => (0, 0),
            Err(_) => (u32::MAX, 999_999),
        }
    }
}
