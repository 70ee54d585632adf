//! End-to-end capture pipeline tests driven by replayed frames

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use pcap_parser::PcapCapture;
use wirelens_capture::test_utils::{arp_frame, tcp_frame, udp_frame, TCP_SYN};
use wirelens_capture::{
    render_json, render_table, ArchiveStatus, CancelToken, CaptureSession, ReplaySource,
    SessionConfig, StopReason,
};
use wirelens_core::{PacketSnapshot, RawFrame, UNKNOWN_ADDRESS};

fn scenario_frames() -> Vec<RawFrame> {
    let base = Utc.timestamp_opt(1_717_243_200, 0).unwrap();
    let at = |ms: i64| base + ChronoDuration::milliseconds(ms);

    vec![
        RawFrame::new(
            tcp_frame([10, 0, 0, 1], 51000, [10, 0, 0, 2], 443, TCP_SYN, b""),
            at(0),
        ),
        RawFrame::new(
            udp_frame([10, 0, 0, 1], 53000, [8, 8, 8, 8], 53, &[0u8; 29]),
            at(15),
        ),
        RawFrame::new(
            arp_frame(
                1,
                [0x02, 0x42, 0xac, 0x11, 0x00, 0x02],
                [10, 0, 0, 1],
                [0; 6],
                [10, 0, 0, 5],
            ),
            at(250),
        ),
    ]
}

#[test]
fn test_three_frame_scenario() {
    let mut source = ReplaySource::new(scenario_frames());
    let mut live: Vec<String> = Vec::new();
    let mut observer = |s: &PacketSnapshot| live.push(wirelens_capture::live_line(s));

    let mut session = CaptureSession::new(SessionConfig::default().count(3)).unwrap();
    let outcome = session
        .run(&mut source, &CancelToken::new(), Some(&mut observer))
        .unwrap();

    assert!(!outcome.is_cancelled());
    let report = outcome.into_report();
    assert_eq!(report.stop_reason, StopReason::CountReached);
    assert_eq!(report.archive, ArchiveStatus::NotRequested);

    let protocols: Vec<&str> = report.snapshots.iter().map(|s| s.protocol.as_str()).collect();
    assert_eq!(protocols, vec!["TCP", "UDP", "ARP"]);

    let tcp = &report.snapshots[0];
    assert_eq!((tcp.source.as_str(), tcp.destination.as_str()), ("10.0.0.1", "10.0.0.2"));
    assert_eq!(tcp.summary, "TCP 51000 -> 443 len=20 flags=S");
    assert_eq!(tcp.timestamp, "2024-06-01T12:00:00.000000");

    let udp = &report.snapshots[1];
    assert_eq!((udp.source.as_str(), udp.destination.as_str()), ("10.0.0.1", "8.8.8.8"));
    assert_eq!(udp.summary, "UDP 53000 -> 53 len=37");
    assert_eq!(udp.timestamp, "2024-06-01T12:00:00.015000");

    // Protocol addresses, not hardware addresses
    let arp = &report.snapshots[2];
    assert_eq!((arp.source.as_str(), arp.destination.as_str()), ("10.0.0.1", "10.0.0.5"));
    assert_ne!(arp.source, UNKNOWN_ADDRESS);
    assert!(arp.summary.starts_with("ARP request 02:42:ac:11:00:02 (10.0.0.1)"));
    assert_eq!(arp.length, 42);

    assert_eq!(live.len(), 3);
    assert!(live[0].starts_with("[2024-06-01T12:00:00.000000] TCP 10.0.0.1 -> 10.0.0.2 len=54 |"));

    let table = render_table(&report.snapshots);
    assert_eq!(table.lines().count(), 5);

    let json: serde_json::Value = serde_json::from_str(&render_json(&report.snapshots).unwrap()).unwrap();
    assert_eq!(json[2]["protocol"], "ARP");
    assert_eq!(json[1]["dst"], "8.8.8.8");
}

#[test]
fn test_archive_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("captures").join("scenario.pcap");
    let frames = scenario_frames();

    let mut source = ReplaySource::new(frames.clone());
    let mut session =
        CaptureSession::new(SessionConfig::default().archive_path(&path).quiet(true)).unwrap();
    let report = session
        .run(&mut source, &CancelToken::new(), None)
        .unwrap()
        .into_report();

    assert_eq!(report.stop_reason, StopReason::SourceExhausted);
    let written = match &report.archive {
        ArchiveStatus::Written(written) => written.clone(),
        other => panic!("unexpected archive status {:?}", other),
    };
    assert_eq!(written.frames_written, 3);

    let bytes = std::fs::read(&path).unwrap();
    let capture = PcapCapture::from_file(&bytes).unwrap();
    assert_eq!(capture.blocks.len(), frames.len());
    for (block, frame) in capture.blocks.iter().zip(&frames) {
        let (secs, micros) = frame.timestamp_parts();
        assert_eq!(block.data, frame.data.as_slice());
        assert_eq!((block.ts_sec, block.ts_usec), (secs, micros));
        assert_eq!(block.origlen, frame.wire_len);
    }

    // The archive replays into the same snapshots
    let mut replay = ReplaySource::from_pcap_file(&path).unwrap();
    let mut again = CaptureSession::new(SessionConfig::default()).unwrap();
    let replayed = again
        .run(&mut replay, &CancelToken::new(), None)
        .unwrap()
        .into_report();
    assert_eq!(replayed.snapshots, report.snapshots);
}

#[test]
fn test_filtered_capture_archives_only_accepted_frames() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("arp.pcap");

    let mut source = ReplaySource::new(scenario_frames());
    let mut session =
        CaptureSession::new(SessionConfig::default().filter("arp").archive_path(&path)).unwrap();
    let report = session
        .run(&mut source, &CancelToken::new(), None)
        .unwrap()
        .into_report();

    assert_eq!(report.snapshots.len(), 1);
    assert_eq!(report.stats.frames_filtered, 2);

    let bytes = std::fs::read(&path).unwrap();
    let capture = PcapCapture::from_file(&bytes).unwrap();
    assert_eq!(capture.blocks.len(), 1);
}
