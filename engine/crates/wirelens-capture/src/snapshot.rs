//! Snapshot construction

use wirelens_core::{PacketSnapshot, RawFrame, TIMESTAMP_FORMAT};

use crate::classify::ClassifiedHeaders;

/// Combine a raw frame and its classification into a snapshot.
///
/// A frame without a capture time is stamped with the Unix epoch.
pub fn build_snapshot(frame: &RawFrame, headers: ClassifiedHeaders) -> PacketSnapshot {
    PacketSnapshot {
        timestamp: frame
            .timestamp_or_epoch()
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        source: headers.source,
        destination: headers.destination,
        protocol: headers.protocol.as_tag(),
        length: frame.wire_len,
        summary: headers.description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wirelens_core::Protocol;

    fn headers() -> ClassifiedHeaders {
        ClassifiedHeaders {
            protocol: Protocol::Udp,
            source: "10.0.0.1".into(),
            destination: "8.8.8.8".into(),
            description: "UDP 53000 -> 53 len=8".into(),
        }
    }

    #[test]
    fn test_snapshot_microsecond_timestamp() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let frame = RawFrame::new(vec![0u8; 42], ts);
        let snapshot = build_snapshot(&frame, headers());

        assert_eq!(snapshot.timestamp, "2023-11-14T22:13:20.123456");
        assert_eq!(snapshot.protocol, "UDP");
        assert_eq!(snapshot.source, "10.0.0.1");
        assert_eq!(snapshot.length, 42);
        assert_eq!(snapshot.summary, "UDP 53000 -> 53 len=8");
    }

    #[test]
    fn test_snapshot_missing_timestamp() {
        let frame = RawFrame::untimed(vec![0u8; 10]);
        let snapshot = build_snapshot(&frame, headers());
        assert_eq!(snapshot.timestamp, "1970-01-01T00:00:00.000000");
    }

    #[test]
    fn test_snapshot_uses_wire_length() {
        let frame = RawFrame::untimed(vec![0u8; 64]).with_wire_len(1514);
        let snapshot = build_snapshot(&frame, headers());
        assert_eq!(snapshot.length, 1514);
    }
}
