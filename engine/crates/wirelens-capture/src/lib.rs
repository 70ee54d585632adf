//! Wirelens Capture - frame capture, classification and archiving
//!
//! This crate provides the capture pipeline:
//! - Frame sources (live interfaces via `pnet`, in-memory and pcap replay)
//! - Layered decoding into a header stack and protocol classification
//! - Per-frame snapshots, software filtering and session stop conditions
//! - Classic pcap archiving and table/JSON report rendering

pub mod archive;
pub mod classify;
pub mod decode;
pub mod error;
pub mod filter;
pub mod report;
pub mod session;
pub mod snapshot;
pub mod source;
pub mod test_utils;

pub use archive::{write_pcap, ArchiveReport, ArchiveStatus, Archiver, PcapWriter};
pub use classify::{classify, describe_transport, format_tcp_flags, ClassifiedHeaders};
pub use decode::{decode, HeaderStack, Layer};
pub use error::{CaptureError, CaptureResult, ErrorKind};
pub use filter::FrameFilter;
pub use report::{live_line, render_json, render_stats, render_table};
pub use session::{
    CancelToken, CaptureReport, CaptureSession, CaptureStats, FrameObserver, SessionConfig,
    SessionOutcome, SessionState, StopReason,
};
pub use snapshot::build_snapshot;
pub use source::{interfaces, FrameSource, InterfaceInfo, LiveSource, ReplaySource, SourceEvent};
