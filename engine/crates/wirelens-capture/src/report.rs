//! Text and JSON rendering of captured snapshots

use wirelens_core::PacketSnapshot;

use crate::session::CaptureStats;

/// Widest a table column may grow
pub const MAX_COLUMN_WIDTH: usize = 60;

const HEADERS: [&str; 6] = [
    "Timestamp",
    "Protocol",
    "Source",
    "Destination",
    "Length",
    "Summary",
];

/// One-line rendering used while capturing
pub fn live_line(snapshot: &PacketSnapshot) -> String {
    format!(
        "[{}] {} {} -> {} len={} | {}",
        snapshot.timestamp,
        snapshot.protocol,
        snapshot.source,
        snapshot.destination,
        snapshot.length,
        snapshot.summary
    )
}

/// Pretty-printed JSON array of snapshots in capture order
pub fn render_json(snapshots: &[PacketSnapshot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(snapshots)
}

/// Fixed-width table with a dashed rule under the header.
///
/// Columns are as wide as their widest cell, up to [`MAX_COLUMN_WIDTH`];
/// longer cells end in `...`.
pub fn render_table(snapshots: &[PacketSnapshot]) -> String {
    if snapshots.is_empty() {
        return "No packets captured.".to_string();
    }

    let header: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
    let rows: Vec<Vec<String>> = snapshots
        .iter()
        .map(|s| {
            vec![
                s.timestamp.clone(),
                s.protocol.clone(),
                s.source.clone(),
                s.destination.clone(),
                s.length.to_string(),
                s.summary.clone(),
            ]
        })
        .collect();

    let widths: Vec<usize> = (0..HEADERS.len())
        .map(|idx| {
            std::iter::once(&header)
                .chain(rows.iter())
                .map(|row| row[idx].chars().count())
                .max()
                .unwrap_or(0)
                .min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(&header, &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    lines.extend(rows.iter().map(|row| format_row(row, &widths)));
    lines.join("\n")
}

fn format_row(row: &[String], widths: &[usize]) -> String {
    row.iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", clip(cell, width), width = width))
        .collect::<Vec<_>>()
        .join("  ")
}

fn clip(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        return cell.to_string();
    }
    let kept: String = cell.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Short statistics trailer, e.g. for stderr after the report
pub fn render_stats(stats: &CaptureStats) -> String {
    let mut line = format!(
        "{} packets captured ({} bytes, {} seen, {} filtered) in {:.3}s",
        stats.frames_captured,
        stats.bytes_captured,
        stats.frames_seen,
        stats.frames_filtered,
        stats.capture_duration_ms as f64 / 1000.0
    );
    if !stats.protocol_breakdown.is_empty() {
        let breakdown: Vec<String> = stats
            .protocol_breakdown
            .iter()
            .map(|(proto, count)| format!("{}={}", proto, count))
            .collect();
        line.push_str(&format!(" [{}]", breakdown.join(" ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(summary: &str) -> PacketSnapshot {
        PacketSnapshot {
            timestamp: "2024-05-01T12:00:00.000001".into(),
            source: "10.0.0.1".into(),
            destination: "10.0.0.2".into(),
            protocol: "TCP".into(),
            length: 74,
            summary: summary.into(),
        }
    }

    #[test]
    fn test_live_line() {
        let line = live_line(&snapshot("TCP 51000 -> 443 len=40 flags=S"));
        assert_eq!(
            line,
            "[2024-05-01T12:00:00.000001] TCP 10.0.0.1 -> 10.0.0.2 len=74 | TCP 51000 -> 443 len=40 flags=S"
        );
    }

    #[test]
    fn test_table_empty() {
        assert_eq!(render_table(&[]), "No packets captured.");
    }

    #[test]
    fn test_table_layout() {
        let table = render_table(&[snapshot("short")]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Timestamp                   Protocol  Source"));
        assert!(lines[1].starts_with("--------------------------  --------  --------"));
        assert!(lines[2].starts_with("2024-05-01T12:00:00.000001  TCP       10.0.0.1"));
        // Every line is padded to the same width
        assert_eq!(lines[0].len(), lines[2].len());
    }

    #[test]
    fn test_table_clips_long_cells() {
        let long = "x".repeat(80);
        let table = render_table(&[snapshot(&long)]);
        let row = table.lines().nth(2).unwrap();

        let expected = format!("{}...", "x".repeat(57));
        assert!(row.ends_with(&expected));
        assert!(!row.contains(&"x".repeat(58)));
        let rule = table.lines().nth(1).unwrap();
        assert!(rule.ends_with(&"-".repeat(MAX_COLUMN_WIDTH)));
    }

    #[test]
    fn test_json_round_trip_order() {
        let snaps = vec![snapshot("first"), snapshot("second")];
        let json = render_json(&snaps).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let arr = value.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["summary"], "first");
        assert_eq!(arr[1]["summary"], "second");
        assert_eq!(arr[0]["src"], "10.0.0.1");
        assert_eq!(arr[0]["length"], 74);
        assert!(json.contains("\n  {"));
    }

    #[test]
    fn test_render_stats() {
        let mut stats = CaptureStats {
            frames_captured: 3,
            bytes_captured: 180,
            frames_seen: 4,
            frames_filtered: 1,
            capture_duration_ms: 1500,
            ..Default::default()
        };
        stats.protocol_breakdown.insert("TCP".into(), 2);
        stats.protocol_breakdown.insert("ARP".into(), 1);

        assert_eq!(
            render_stats(&stats),
            "3 packets captured (180 bytes, 4 seen, 1 filtered) in 1.500s [ARP=1 TCP=2]"
        );
    }
}
