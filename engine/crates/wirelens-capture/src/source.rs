//! Frame sources
//!
//! A capture session pulls frames from a [`FrameSource`]. [`LiveSource`] reads
//! from a network interface through a `pnet` datalink channel;
//! [`ReplaySource`] yields frames that are already in memory or were loaded
//! from a pcap file.

use std::collections::VecDeque;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use pcap_parser::PcapCapture;
use pnet::datalink::{self, Channel::Ethernet, Config as PnetConfig, DataLinkReceiver, NetworkInterface};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wirelens_core::RawFrame;

use crate::error::{CaptureError, CaptureResult};

/// Outcome of one poll of a frame source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A frame was captured
    Frame(RawFrame),
    /// Nothing arrived within the poll interval
    Idle,
    /// The source will never yield another frame
    Exhausted,
}

/// Pull interface over anything that produces link-layer frames.
///
/// Implementations must return within a bounded time so the caller can poll
/// its stop conditions between events.
pub trait FrameSource {
    /// Human-readable name used in logs
    fn describe(&self) -> String;

    /// Wait for the next frame, at most one poll interval.
    fn next_event(&mut self) -> CaptureResult<SourceEvent>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn next_event(&mut self) -> CaptureResult<SourceEvent> {
        (**self).next_event()
    }
}

// ── Interfaces ───────────────────────────────────────────────────────────────

/// Capture-capable interface as reported by the OS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: String,
    pub up: bool,
    pub loopback: bool,
    pub mac: Option<String>,
    pub ips: Vec<String>,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(iface: &NetworkInterface) -> Self {
        Self {
            name: iface.name.clone(),
            description: iface.description.clone(),
            up: iface.is_up(),
            loopback: iface.is_loopback(),
            mac: iface.mac.map(|m| m.to_string()),
            ips: iface.ips.iter().map(|ip| ip.to_string()).collect(),
        }
    }
}

/// List the interfaces frames can be captured on.
pub fn interfaces() -> Vec<InterfaceInfo> {
    datalink::interfaces().iter().map(InterfaceInfo::from).collect()
}

/// Find the named interface, or the first one that is up, not loopback and
/// has an address.
fn resolve_interface(name: Option<&str>) -> CaptureResult<NetworkInterface> {
    let interfaces = datalink::interfaces();

    match name {
        Some(name) => interfaces
            .into_iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| CaptureError::InterfaceNotFound(name.to_string())),
        None => interfaces
            .into_iter()
            .find(|iface| iface.is_up() && !iface.is_loopback() && !iface.ips.is_empty())
            .ok_or_else(|| CaptureError::InterfaceNotFound("No suitable interface found".into())),
    }
}

// ── Live capture ─────────────────────────────────────────────────────────────

/// Frames read from a network interface
pub struct LiveSource {
    interface: String,
    rx: Box<dyn DataLinkReceiver>,
}

impl LiveSource {
    /// Open an Ethernet channel on `interface`, or on the default interface
    /// when `None`.
    ///
    /// `read_timeout` bounds how long [`FrameSource::next_event`] blocks.
    pub fn open(
        interface: Option<&str>,
        promiscuous: bool,
        read_timeout: Duration,
    ) -> CaptureResult<Self> {
        let iface = resolve_interface(interface)?;

        let mut config = PnetConfig::default();
        config.promiscuous = promiscuous;
        config.read_timeout = Some(read_timeout);

        let rx = match datalink::channel(&iface, config) {
            Ok(Ethernet(_tx, rx)) => rx,
            Ok(_) => {
                return Err(CaptureError::ChannelOpen("Unsupported channel type".into()));
            }
            Err(e) if e.kind() == IoErrorKind::PermissionDenied => {
                return Err(CaptureError::permission_denied(&iface.name));
            }
            Err(e) => {
                return Err(CaptureError::ChannelOpen(format!("{}: {}", iface.name, e)));
            }
        };

        info!(
            "Opened capture channel on '{}' (promiscuous: {}, poll: {:?})",
            iface.name, promiscuous, read_timeout
        );

        Ok(Self {
            interface: iface.name,
            rx,
        })
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl FrameSource for LiveSource {
    fn describe(&self) -> String {
        format!("interface {}", self.interface)
    }

    fn next_event(&mut self) -> CaptureResult<SourceEvent> {
        match self.rx.next() {
            Ok(data) => Ok(SourceEvent::Frame(RawFrame::new(data, Utc::now()))),
            Err(e) if is_read_timeout(&e) => Ok(SourceEvent::Idle),
            Err(e) => {
                warn!("Packet read error on {}: {}", self.interface, e);
                Ok(SourceEvent::Idle)
            }
        }
    }
}

fn is_read_timeout(e: &std::io::Error) -> bool {
    if matches!(e.kind(), IoErrorKind::TimedOut | IoErrorKind::WouldBlock) {
        return true;
    }
    // Some platforms only report the timeout in the message
    let msg = e.to_string();
    msg.contains("timed out") || msg.contains("Timed out")
}

// ── Replay ───────────────────────────────────────────────────────────────────

/// Frames replayed from memory in order.
///
/// Once drained the source reports [`SourceEvent::Exhausted`], or keeps
/// reporting [`SourceEvent::Idle`] when built with [`ReplaySource::idle_when_drained`].
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    name: String,
    frames: VecDeque<RawFrame>,
    idle_interval: Option<Duration>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = RawFrame>) -> Self {
        Self {
            name: "replay".to_string(),
            frames: frames.into_iter().collect(),
            idle_interval: None,
        }
    }

    /// Behave like a quiet interface once drained: sleep `interval` and
    /// report idle, forever.
    pub fn idle_when_drained(mut self, interval: Duration) -> Self {
        self.idle_interval = Some(interval);
        self
    }

    /// Load every record of a classic pcap file with Ethernet link type.
    pub fn from_pcap_file(path: impl AsRef<Path>) -> CaptureResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let invalid = |message: String| CaptureError::InvalidCaptureFile {
            path: path.to_path_buf(),
            message,
        };

        let capture = PcapCapture::from_file(&bytes).map_err(|e| invalid(format!("{:?}", e)))?;
        if capture.header.network.0 != 1 {
            return Err(invalid(format!(
                "unsupported link type {}",
                capture.header.network.0
            )));
        }

        // The sub-second field holds nanoseconds for the a1b23c4d magic
        let nanos_per_tick: u32 = if capture.header.is_nanosecond_precision() {
            1
        } else {
            1000
        };

        let frames: VecDeque<RawFrame> = capture
            .blocks
            .iter()
            .map(|block| {
                let frame = RawFrame::untimed(block.data.to_vec()).with_wire_len(block.origlen);
                match Utc
                    .timestamp_opt(
                        block.ts_sec as i64,
                        block.ts_usec.saturating_mul(nanos_per_tick),
                    )
                    .single()
                {
                    Some(ts) => RawFrame {
                        captured_at: Some(ts),
                        ..frame
                    },
                    None => frame,
                }
            })
            .collect();

        debug!("Loaded {} frames from {:?}", frames.len(), path);

        Ok(Self {
            name: path.display().to_string(),
            frames,
            idle_interval: None,
        })
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn next_event(&mut self) -> CaptureResult<SourceEvent> {
        if let Some(frame) = self.frames.pop_front() {
            return Ok(SourceEvent::Frame(frame));
        }
        match self.idle_interval {
            Some(interval) => {
                std::thread::sleep(interval);
                Ok(SourceEvent::Idle)
            }
            None => Ok(SourceEvent::Exhausted),
        }
    }
}
