//! Capture archiving to classic libpcap files

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wirelens_core::RawFrame;

use crate::error::{CaptureError, CaptureResult};

/// Snapshot length advertised in the global header
pub const PCAP_SNAPLEN: u32 = 262_144;

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const LINKTYPE_ETHERNET: u32 = 1;
const GLOBAL_HEADER_LEN: u64 = 24;
const RECORD_HEADER_LEN: u64 = 16;

/// Result of a successful archive write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub path: PathBuf,
    pub frames_written: u64,
    pub bytes_written: u64,
}

/// What happened to the raw frames at the end of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArchiveStatus {
    /// No destination was configured
    NotRequested,
    /// A destination was configured but nothing was captured; no file created
    Skipped,
    Written(ArchiveReport),
    /// Writing failed; the snapshots are unaffected
    Failed { path: PathBuf, message: String },
}

impl ArchiveStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, ArchiveStatus::Failed { .. })
    }
}

// ── PCAP Writer ──────────────────────────────────────────────────────────────

/// Classic libpcap writer, little-endian, microsecond timestamps.
///
/// Global header: 24 bytes, per-frame record header: 16 bytes.
pub struct PcapWriter<W: Write> {
    writer: W,
    frames_written: u64,
    bytes_written: u64,
}

impl<W: Write> PcapWriter<W> {
    /// Create a new writer and emit the global header.
    pub fn new(mut writer: W) -> std::io::Result<Self> {
        let version_major: u16 = 2;
        let version_minor: u16 = 4;
        let thiszone: i32 = 0;
        let sigfigs: u32 = 0;

        writer.write_all(&PCAP_MAGIC.to_le_bytes())?;
        writer.write_all(&version_major.to_le_bytes())?;
        writer.write_all(&version_minor.to_le_bytes())?;
        writer.write_all(&thiszone.to_le_bytes())?;
        writer.write_all(&sigfigs.to_le_bytes())?;
        writer.write_all(&PCAP_SNAPLEN.to_le_bytes())?;
        writer.write_all(&LINKTYPE_ETHERNET.to_le_bytes())?;

        Ok(Self {
            writer,
            frames_written: 0,
            bytes_written: GLOBAL_HEADER_LEN,
        })
    }

    /// Append one frame record.
    ///
    /// The original length is never smaller than the captured length.
    pub fn write_frame(&mut self, frame: &RawFrame) -> std::io::Result<()> {
        let (ts_sec, ts_usec) = frame.timestamp_parts();
        let incl_len = frame.captured_len();
        let orig_len = frame.wire_len.max(incl_len);

        self.writer.write_all(&ts_sec.to_le_bytes())?;
        self.writer.write_all(&ts_usec.to_le_bytes())?;
        self.writer.write_all(&incl_len.to_le_bytes())?;
        self.writer.write_all(&orig_len.to_le_bytes())?;
        self.writer.write_all(&frame.data)?;

        self.frames_written += 1;
        self.bytes_written += RECORD_HEADER_LEN + frame.data.len() as u64;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write `frames` to a new pcap file at `path`, creating parent directories.
pub fn write_pcap(path: &Path, frames: &[RawFrame]) -> CaptureResult<ArchiveReport> {
    let persistence = |source: std::io::Error| CaptureError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(persistence)?;
    }

    let file = File::create(path).map_err(persistence)?;
    let mut pcap = PcapWriter::new(BufWriter::new(file)).map_err(persistence)?;
    for frame in frames {
        pcap.write_frame(frame).map_err(persistence)?;
    }
    pcap.flush().map_err(persistence)?;

    Ok(ArchiveReport {
        path: path.to_path_buf(),
        frames_written: pcap.frames_written(),
        bytes_written: pcap.bytes_written(),
    })
}

// ── Archiver ─────────────────────────────────────────────────────────────────

/// Buffers raw frames in capture order until the session ends
#[derive(Debug, Default)]
pub struct Archiver {
    frames: Vec<RawFrame>,
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: RawFrame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.frames
    }

    /// Persist the buffered frames if a destination was requested.
    ///
    /// Failures are reported in the returned status, never raised.
    pub fn finish(&self, destination: Option<&Path>) -> ArchiveStatus {
        let path = match destination {
            Some(path) => path,
            None => return ArchiveStatus::NotRequested,
        };

        if self.frames.is_empty() {
            info!("No frames captured; not writing {:?}", path);
            return ArchiveStatus::Skipped;
        }

        match write_pcap(path, &self.frames) {
            Ok(report) => {
                info!(
                    "Wrote {} frames ({} bytes) to {:?}",
                    report.frames_written, report.bytes_written, report.path
                );
                ArchiveStatus::Written(report)
            }
            Err(e) => {
                warn!("{}", e);
                ArchiveStatus::Failed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        }
    }

    /// Hand the buffered frames to the caller.
    pub fn into_frames(self) -> Vec<RawFrame> {
        self.frames
    }
}
