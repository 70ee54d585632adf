//! Capture session
//!
//! A [`CaptureSession`] pulls frames from a [`FrameSource`] until one of its
//! stop conditions holds, turning each accepted frame into a
//! [`PacketSnapshot`] and buffering the raw bytes for the [`Archiver`].
//!
//! Stop conditions are checked in a fixed order on every iteration:
//! cancellation, then the time budget, then (after each accepted frame) the
//! frame count. Sources return within one poll interval, so a stop condition
//! is noticed at most one interval late.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};
use wirelens_core::{PacketSnapshot, RawFrame, UNKNOWN_ADDRESS};

use crate::archive::{ArchiveStatus, Archiver};
use crate::classify::classify;
use crate::decode::decode;
use crate::error::{CaptureError, CaptureResult};
use crate::filter::FrameFilter;
use crate::snapshot::build_snapshot;
use crate::source::{FrameSource, SourceEvent};

/// Default poll interval of live sources
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

const TOP_TALKERS: usize = 10;

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for a single capture session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Network interface name (e.g., "eth0"). If None, auto-detect.
    pub interface: Option<String>,

    /// Filter expression (e.g., "tcp port 443" or "arp").
    pub filter: Option<String>,

    /// Stop after this many accepted frames (0 = unlimited).
    #[serde(default)]
    pub count: u64,

    /// Stop after this much time has passed.
    pub timeout: Option<Duration>,

    /// Write the captured frames to this pcap file at the end.
    pub archive_path: Option<PathBuf>,

    /// Do not notify the per-frame observer.
    #[serde(default)]
    pub quiet: bool,

    /// Enable promiscuous mode on the interface.
    #[serde(default)]
    pub promiscuous: bool,

    /// Poll interval of the live source.
    #[serde(default = "default_read_timeout")]
    pub read_timeout: Duration,
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interface: None,
            filter: None,
            count: 0,
            timeout: None,
            archive_path: None,
            quiet: false,
            promiscuous: false,
            read_timeout: default_read_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interface = Some(name.into());
        self
    }

    pub fn filter(mut self, expr: impl Into<String>) -> Self {
        self.filter = Some(expr.into());
        self
    }

    pub fn count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn archive_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive_path = Some(path.into());
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn promiscuous(mut self, promiscuous: bool) -> Self {
        self.promiscuous = promiscuous;
        self
    }

    pub fn read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────────

/// Shared flag asking a running session to stop.
///
/// Clones observe the same flag, so one can be handed to a signal handler
/// while the session holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation of an ongoing capture.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Receives each snapshot as soon as it is built
pub trait FrameObserver {
    fn on_snapshot(&mut self, snapshot: &PacketSnapshot);
}

impl<F> FrameObserver for F
where
    F: FnMut(&PacketSnapshot),
{
    fn on_snapshot(&mut self, snapshot: &PacketSnapshot) {
        self(snapshot)
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Why the capture loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CountReached,
    TimeBudgetElapsed,
    SourceExhausted,
    Cancelled,
}

/// Aggregate statistics from a finished capture session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    /// Frames delivered by the source, before filtering
    pub frames_seen: u64,
    /// Frames rejected by the filter
    pub frames_filtered: u64,
    pub frames_captured: u64,
    /// Sum of wire lengths of the captured frames
    pub bytes_captured: u64,
    pub protocol_breakdown: BTreeMap<String, u64>,
    /// Addresses by bytes sent or received, largest first
    pub top_talkers: Vec<(String, u64)>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub capture_duration_ms: u64,
}

/// Everything a session produced
#[derive(Debug, Clone)]
pub struct CaptureReport {
    /// One snapshot per captured frame, in capture order
    pub snapshots: Vec<PacketSnapshot>,
    /// The raw frames behind `snapshots`, same order
    pub frames: Vec<RawFrame>,
    pub stop_reason: StopReason,
    pub stats: CaptureStats,
    pub archive: ArchiveStatus,
}

/// How a session ended.
///
/// Both variants carry the full report; `Cancelled` tells the caller the run
/// was interrupted rather than finished.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Completed(CaptureReport),
    Cancelled(CaptureReport),
}

impl SessionOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SessionOutcome::Cancelled(_))
    }

    pub fn report(&self) -> &CaptureReport {
        match self {
            SessionOutcome::Completed(report) | SessionOutcome::Cancelled(report) => report,
        }
    }

    pub fn into_report(self) -> CaptureReport {
        match self {
            SessionOutcome::Completed(report) | SessionOutcome::Cancelled(report) => report,
        }
    }
}

// ── Capture Session ──────────────────────────────────────────────────────────

/// A single packet capture session.
///
/// Use [`CaptureSession::new`] to create, then call [`CaptureSession::run`]
/// to start capturing. A session runs once.
#[derive(Debug)]
pub struct CaptureSession {
    config: SessionConfig,
    filter: FrameFilter,
    state: SessionState,
}

impl CaptureSession {
    /// Create a new capture session with the given config.
    pub fn new(config: SessionConfig) -> CaptureResult<Self> {
        if config.timeout == Some(Duration::ZERO) {
            return Err(CaptureError::Configuration(
                "timeout must be a positive duration".into(),
            ));
        }
        if config.read_timeout.is_zero() {
            return Err(CaptureError::Configuration(
                "read timeout must be a positive duration".into(),
            ));
        }

        let filter = match &config.filter {
            Some(expr) => FrameFilter::parse(expr)?,
            None => FrameFilter::any(),
        };

        Ok(Self {
            config,
            filter,
            state: SessionState::Idle,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the capture. This blocks until a stop condition holds.
    ///
    /// Archiving runs after the loop whatever the stop reason and cannot be
    /// cancelled. If `cancel` is set by the time the loop has ended, the
    /// outcome is `Cancelled` even when another condition stopped the loop.
    pub fn run<S>(
        &mut self,
        source: &mut S,
        cancel: &CancelToken,
        mut observer: Option<&mut dyn FrameObserver>,
    ) -> CaptureResult<SessionOutcome>
    where
        S: FrameSource + ?Sized,
    {
        if self.state != SessionState::Idle {
            return Err(CaptureError::Configuration(
                "capture session has already run".into(),
            ));
        }
        self.state = SessionState::Running;

        info!(
            "Capture started on {} (filter: {:?}, count: {}, timeout: {:?})",
            source.describe(),
            self.config.filter,
            self.config.count,
            self.config.timeout
        );

        let started_at = Utc::now();
        let clock = Instant::now();
        // A budget too large for the clock never expires
        let deadline = self.config.timeout.and_then(|t| clock.checked_add(t));

        let mut snapshots: Vec<PacketSnapshot> = Vec::new();
        let mut archiver = Archiver::new();
        let mut tally = Tally::default();

        let result = loop {
            if cancel.is_cancelled() {
                info!("Capture cancelled by user");
                break Ok(StopReason::Cancelled);
            }

            if deadline.map_or(false, |d| Instant::now() >= d) {
                debug!("Capture duration limit reached");
                break Ok(StopReason::TimeBudgetElapsed);
            }

            let event = match source.next_event() {
                Ok(event) => event,
                Err(e) => break Err(e),
            };

            match event {
                SourceEvent::Frame(frame) => {
                    tally.frames_seen += 1;

                    let stack = decode(&frame.data);
                    if !self.filter.matches(&stack) {
                        tally.frames_filtered += 1;
                        trace!("Frame of {} bytes rejected by filter", frame.wire_len);
                        continue;
                    }

                    let snapshot = build_snapshot(&frame, classify(&stack));
                    trace!(
                        "{} {} -> {} len={}",
                        snapshot.protocol,
                        snapshot.source,
                        snapshot.destination,
                        snapshot.length
                    );

                    tally.record(&snapshot);
                    if !self.config.quiet {
                        if let Some(observer) = observer.as_mut() {
                            observer.on_snapshot(&snapshot);
                        }
                    }
                    snapshots.push(snapshot);
                    archiver.push(frame);

                    if self.config.count > 0 && snapshots.len() as u64 >= self.config.count {
                        debug!("Capture packet limit reached");
                        break Ok(StopReason::CountReached);
                    }
                }
                SourceEvent::Idle => continue,
                SourceEvent::Exhausted => {
                    debug!("Capture source exhausted");
                    break Ok(StopReason::SourceExhausted);
                }
            }
        };

        let stop_reason = match result {
            Ok(reason) => reason,
            Err(e) => {
                self.state = SessionState::Completed;
                return Err(e);
            }
        };

        let cancelled = stop_reason == StopReason::Cancelled || cancel.is_cancelled();

        let archive = archiver.finish(self.config.archive_path.as_deref());
        let ended_at = Utc::now();
        let stats = tally.finish(started_at, ended_at, clock.elapsed());

        info!(
            "Capture complete: {} packets, {} bytes ({:?})",
            stats.frames_captured, stats.bytes_captured, stop_reason
        );

        let report = CaptureReport {
            snapshots,
            frames: archiver.into_frames(),
            stop_reason,
            stats,
            archive,
        };

        if cancelled {
            self.state = SessionState::Cancelled;
            Ok(SessionOutcome::Cancelled(report))
        } else {
            self.state = SessionState::Completed;
            Ok(SessionOutcome::Completed(report))
        }
    }
}

/// Running counters behind [`CaptureStats`]
#[derive(Default)]
struct Tally {
    frames_seen: u64,
    frames_filtered: u64,
    frames_captured: u64,
    bytes_captured: u64,
    protocol_counts: BTreeMap<String, u64>,
    host_bytes: HashMap<String, u64>,
}

impl Tally {
    fn record(&mut self, snapshot: &PacketSnapshot) {
        let length = snapshot.length as u64;
        self.frames_captured += 1;
        self.bytes_captured += length;
        *self
            .protocol_counts
            .entry(snapshot.protocol.clone())
            .or_default() += 1;

        for host in [&snapshot.source, &snapshot.destination] {
            if host != UNKNOWN_ADDRESS {
                *self.host_bytes.entry(host.clone()).or_default() += length;
            }
        }
    }

    fn finish(self, started_at: DateTime<Utc>, ended_at: DateTime<Utc>, elapsed: Duration) -> CaptureStats {
        let mut top_talkers: Vec<(String, u64)> = self.host_bytes.into_iter().collect();
        top_talkers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_talkers.truncate(TOP_TALKERS);

        CaptureStats {
            frames_seen: self.frames_seen,
            frames_filtered: self.frames_filtered,
            frames_captured: self.frames_captured,
            bytes_captured: self.bytes_captured,
            protocol_breakdown: self.protocol_counts,
            top_talkers,
            started_at: Some(started_at),
            ended_at: Some(ended_at),
            capture_duration_ms: elapsed.as_millis() as u64,
        }
    }
}
