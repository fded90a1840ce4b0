//! Event log tailing simulation
//!
//! Runs a tailer against an in-memory channel that a generator task keeps
//! appending to, and prints every emitted event to stdout as a JSON line.
//! Logs go to stderr so the two streams can be separated.
//!
//! # Usage
//!
//! ```bash
//! # Tail a simulated Application channel, 5 records/s, until Ctrl-C
//! cargo run --bin evtail-sim
//!
//! # Small circular log to exercise rollover, stop after 30s
//! cargo run --bin evtail-sim -- --capacity 20 --rate 50 --duration 30
//!
//! # Run unattended with rotating log files
//! cargo run --bin evtail-sim -- --log-dir ./logs
//!
//! # Restart against the same sincedb to see resume behavior
//! cargo run --bin evtail-sim -- --sincedb-path sim.sincedb --start-position beginning
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use evtail_core::{ChannelSink, EventType, MockEventLog, RawRecord, RecordNumber};
use evtail_logging::{EvtailSubscriberBuilder, LogConfig};
use evtail_tailer::{ChannelTailer, ShutdownOutcome, StartPosition, TailerConfig};
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

const SOURCES: &[&str] = &[
    "Service Control Manager",
    "MsiInstaller",
    "Application Error",
    "evtail-sim",
];
const USERS: &[&str] = &["SYSTEM", "LOCAL SERVICE", "NETWORK SERVICE"];

#[derive(Parser)]
#[command(name = "evtail-sim")]
#[command(about = "Tail a simulated event log channel")]
#[command(version)]
struct Args {
    /// Channel to simulate and tail
    #[arg(short, long, default_value = "Application")]
    channel: String,

    /// Poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Offset file (defaults to eventlog-<channel>.sincedb)
    #[arg(long)]
    sincedb_path: Option<PathBuf>,

    /// Minimum time between offset writes in milliseconds
    #[arg(long, default_value_t = 15_000)]
    flush_interval_ms: u64,

    /// Where to start on first contact (beginning, end)
    #[arg(long, default_value = "end")]
    start_position: StartPosition,

    /// Maximum retained records; older ones roll over
    #[arg(long)]
    capacity: Option<usize>,

    /// Records appended per second
    #[arg(long, default_value_t = 5)]
    rate: u32,

    /// Records present before the tailer starts
    #[arg(long, default_value_t = 10)]
    backlog: usize,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration: Option<u64>,

    /// Use pretty console output instead of JSONL
    #[arg(short, long)]
    pretty: bool,

    /// Write JSONL logs to rotating files in this directory instead of the console
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_config = match (&args.log_dir, args.pretty) {
        (Some(dir), _) => LogConfig::service(dir),
        (None, true) => LogConfig::development(),
        (None, false) => LogConfig::default(),
    };
    let _guard = EvtailSubscriberBuilder::new()
        .with_config(log_config)
        .with_level(&args.level)
        .init();

    let log = match args.capacity {
        Some(capacity) => MockEventLog::with_capacity(&args.channel, capacity),
        None => MockEventLog::new(&args.channel),
    };
    for _ in 0..args.backlog {
        log.append(random_record());
    }

    let mut config = TailerConfig::new(&args.channel)
        .with_poll_interval(Duration::from_millis(args.interval_ms))
        .with_flush_interval(Duration::from_millis(args.flush_interval_ms))
        .with_start_position(args.start_position);
    if let Some(path) = &args.sincedb_path {
        config = config.with_offset_path(path);
    }

    let (sink, mut events) = ChannelSink::new(1024);
    let tailer = ChannelTailer::open(&log, sink, config)
        .await
        .context("failed to start tailer")?;
    let handle = tailer.spawn();

    let generator = tokio::spawn(generate(log.clone(), args.rate));

    let printer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        let mut printed = 0u64;
        while let Some(event) = events.recv().await {
            let mut line = serde_json::to_string(&event)?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            printed += 1;
        }
        stdout.flush().await?;
        anyhow::Ok(printed)
    });

    match args.duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c()
            .await
            .context("failed to listen for Ctrl-C")?,
    }

    generator.abort();
    match handle.shutdown().await {
        ShutdownOutcome::Completed { flush } if !flush.is_written() => {
            warn!(outcome = ?flush, "Offsets were not saved");
        }
        _ => {}
    }
    handle.join().await.context("tailer task panicked")?;

    let printed = printer.await.context("printer task panicked")??;
    info!(
        printed,
        newest = ?log.metadata().newest().map(RecordNumber::value),
        "Simulation finished"
    );

    Ok(())
}

/// Append records at `rate` per second until aborted
async fn generate(log: MockEventLog, rate: u32) {
    let period = Duration::from_secs(1) / rate.max(1);
    let mut ticker = tokio::time::interval(period);

    loop {
        ticker.tick().await;
        log.append(random_record());
    }
}

fn random_record() -> RawRecord {
    let mut rng = rand::rng();

    let event_type = match rng.random_range(0..10) {
        0 => EventType::Error,
        1 | 2 => EventType::Warning,
        _ => EventType::Information,
    };
    let source = SOURCES.choose(&mut rng).copied().unwrap_or("evtail-sim");
    let event_id = rng.random_range(1000..1100);

    let mut record = RawRecord::new(RecordNumber::default(), source)
        .with_event_id(event_id)
        .with_event_type(event_type)
        .with_computer("SIMHOST")
        .with_string_inserts(vec![Some(format!("pid={}", rng.random_range(100..9999)))]);

    if rng.random_bool(0.8) {
        record = record.with_description(format!("{source} reported event {event_id}"));
    }
    if let Some(user) = USERS.choose(&mut rng) {
        record = record.with_user(*user);
    }
    if rng.random_bool(0.1) {
        let data: Vec<u8> = (0..8).map(|_| rng.random()).collect();
        record = record.with_data(data);
    }

    record
}
