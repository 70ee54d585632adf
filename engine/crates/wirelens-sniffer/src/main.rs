//! Wirelens - command-line packet sniffer
//!
//! Captures frames on an interface (or replays a pcap file), prints a live
//! line per frame and a final table or JSON report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};
use wirelens_capture::{
    interfaces, live_line, render_json, render_stats, render_table, ArchiveStatus, CancelToken,
    CaptureSession, FrameSource, LiveSource, ReplaySource, SessionConfig,
};
use wirelens_common::{init_logging, Config, OutputFormat};
use wirelens_core::PacketSnapshot;

/// Exit status after an interrupted capture (128 + SIGINT)
const EXIT_INTERRUPTED: u8 = 130;
const EXIT_PERSISTENCE_FAILED: u8 = 1;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Table,
    Json,
}

impl From<OutputArg> for OutputFormat {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Table => OutputFormat::Table,
            OutputArg::Json => OutputFormat::Json,
        }
    }
}

/// Capture packets with optional filtering and emit a concise report
#[derive(Parser, Debug)]
#[command(name = "wirelens")]
#[command(version)]
#[command(
    about = "Capture packets on an interface with optional filtering and emit a concise report",
    long_about = None
)]
struct Args {
    /// Interface to capture on (default: first interface that is up and has an address)
    #[arg(short, long)]
    interface: Option<String>,

    /// Capture filter, e.g. 'tcp and port 443' or 'arp'
    #[arg(short, long)]
    filter: Option<String>,

    /// Stop after N packets (0 means capture until interrupted or timeout)
    #[arg(short, long)]
    count: Option<u64>,

    /// Stop after N seconds
    #[arg(short, long)]
    timeout: Option<f64>,

    /// Write the capture to this pcap file
    #[arg(long)]
    pcap: Option<PathBuf>,

    /// Final report format
    #[arg(short, long, value_enum)]
    output: Option<OutputArg>,

    /// Silence live per-packet lines; only print the final report
    #[arg(long)]
    quiet: bool,

    /// Replay frames from a pcap file instead of capturing live
    #[arg(short, long, conflicts_with = "interface")]
    read: Option<PathBuf>,

    /// List capture interfaces and exit
    #[arg(long)]
    list_interfaces: bool,

    /// Configuration file path
    #[arg(long, env = "WIRELENS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let config = apply_args(config.merge_env()?, &args);
    config.validate()?;

    init_logging(&config.logging)?;

    debug!("Wirelens {} starting", env!("CARGO_PKG_VERSION"));

    if args.list_interfaces {
        print_interfaces();
        return Ok(ExitCode::SUCCESS);
    }

    let session_config = session_config(&config)?;
    let session = CaptureSession::new(session_config.clone())?;

    let source: Box<dyn FrameSource + Send> = match &args.read {
        Some(path) => Box::new(ReplaySource::from_pcap_file(path)?),
        None => Box::new(LiveSource::open(
            session_config.interface.as_deref(),
            session_config.promiscuous,
            session_config.read_timeout,
        )?),
    };

    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();
    let mut capture = tokio::task::spawn_blocking(move || {
        let mut session = session;
        let mut source = source;
        let mut live = |snapshot: &PacketSnapshot| println!("{}", live_line(snapshot));
        session.run(&mut source, &worker_cancel, Some(&mut live))
    });

    let outcome = tokio::select! {
        joined = &mut capture => joined,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    info!("Interrupt received, stopping capture");
                    cancel.cancel();
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
            capture.await
        }
    }
    .context("capture task panicked")??;

    let cancelled = outcome.is_cancelled();
    let report = outcome.into_report();

    let mut exit = ExitCode::SUCCESS;
    match &report.archive {
        ArchiveStatus::Written(written) => eprintln!(
            "Wrote {} packets to {}",
            written.frames_written,
            written.path.display()
        ),
        ArchiveStatus::Failed { path, message } => {
            eprintln!("Failed to write {}: {}", path.display(), message);
            exit = ExitCode::from(EXIT_PERSISTENCE_FAILED);
        }
        ArchiveStatus::Skipped => info!("Nothing captured, no pcap written"),
        ArchiveStatus::NotRequested => {}
    }

    match config.output.format {
        OutputFormat::Json => println!("{}", render_json(&report.snapshots)?),
        OutputFormat::Table => println!("{}", render_table(&report.snapshots)),
    }

    if !config.capture.quiet {
        eprintln!("{}", render_stats(&report.stats));
    }

    if cancelled {
        eprintln!("Capture interrupted by user.");
        if !report.archive.is_failure() {
            exit = ExitCode::from(EXIT_INTERRUPTED);
        }
    }

    Ok(exit)
}

/// Command-line flags override file and environment settings
fn apply_args(mut config: Config, args: &Args) -> Config {
    if let Some(interface) = &args.interface {
        config.capture.interface = Some(interface.clone());
    }
    if let Some(filter) = &args.filter {
        config.capture.filter = Some(filter.clone());
    }
    if let Some(count) = args.count {
        config.capture.count = count;
    }
    if let Some(timeout) = args.timeout {
        config.capture.timeout_secs = Some(timeout);
    }
    if let Some(pcap) = &args.pcap {
        config.capture.pcap = Some(pcap.display().to_string());
    }
    if args.quiet {
        config.capture.quiet = true;
    }
    if let Some(output) = args.output {
        config.output.format = output.into();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
    config
}

fn session_config(config: &Config) -> wirelens_core::Result<SessionConfig> {
    let capture = &config.capture;
    Ok(SessionConfig {
        interface: capture.interface.clone(),
        filter: capture.filter.clone(),
        count: capture.count,
        timeout: capture.timeout()?,
        archive_path: capture.pcap.as_ref().map(PathBuf::from),
        quiet: capture.quiet,
        promiscuous: capture.promiscuous,
        read_timeout: Duration::from_millis(capture.read_timeout_ms),
    })
}

fn print_interfaces() {
    for iface in interfaces() {
        let mut state = vec![if iface.up { "up" } else { "down" }];
        if iface.loopback {
            state.push("loopback");
        }
        println!(
            "{:<16} {:<14} {}",
            iface.name,
            state.join(","),
            iface.ips.join(" ")
        );
    }
}
