//! End-to-end tests for the poll loop and shutdown protocol
//!
//! Every test runs against `MockEventLog` with a sincedb in a temp dir.
//! Deterministic cases drive `poll_once` directly; loop and shutdown cases
//! spawn the tailer with short intervals.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use evtail_core::{
    ChannelSink, EventLogError, EventLogHandle, EventLogSource, EventRecord, LogMetadata,
    MockEventLog, MockEventLogHandle, RawRecord, RecordNumber,
};
use evtail_tailer::{
    ChannelTailer, ShutdownOutcome, StartPosition, TailerConfig, TailerError, TailerPhase,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

const CHANNEL: &str = "Application";
const WAIT: Duration = Duration::from_secs(5);

type Tailer = ChannelTailer<MockEventLogHandle, ChannelSink>;

fn config(dir: &Path, start: StartPosition) -> TailerConfig {
    TailerConfig::new(CHANNEL)
        .with_offset_path(dir.join("eventlog.sincedb"))
        .with_poll_interval(Duration::from_millis(20))
        .with_retry_backoff(Duration::from_millis(20))
        .with_flush_interval(Duration::from_secs(3600))
        .with_start_position(start)
        .with_host("testhost")
}

async fn open(
    log: &MockEventLog,
    config: TailerConfig,
) -> (Tailer, mpsc::Receiver<EventRecord>) {
    evtail_logging::init_testing();
    let (sink, rx) = ChannelSink::new(1024);
    let tailer = ChannelTailer::open(log, sink, config).await.unwrap();
    (tailer, rx)
}

fn drain(rx: &mut mpsc::Receiver<EventRecord>) -> Vec<u64> {
    let mut numbers = Vec::new();
    while let Ok(event) = rx.try_recv() {
        numbers.push(event.record_number.value());
    }
    numbers
}

async fn recv_numbers(rx: &mut mpsc::Receiver<EventRecord>, count: usize) -> Vec<u64> {
    let mut numbers = Vec::with_capacity(count);
    for _ in 0..count {
        let event = timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("sink closed");
        numbers.push(event.record_number.value());
    }
    numbers
}

// ============================================================================
// Start position
// ============================================================================

#[tokio::test]
async fn test_resume_reads_after_saved_offset() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("eventlog.sincedb"), "Application 42\n").unwrap();

    let log = MockEventLog::new(CHANNEL);
    log.evict_before(RecordNumber(10));
    log.append_many(41);
    assert_eq!(log.metadata().oldest, RecordNumber(10));

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 8);

    assert_eq!(drain(&mut rx), (43..=50).collect::<Vec<_>>());
    assert_eq!(tailer.store().get(CHANNEL), Some(RecordNumber(50)));
}

#[tokio::test]
async fn test_rolled_over_offset_starts_at_oldest() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("eventlog.sincedb"), "Application 5\n").unwrap();

    let log = MockEventLog::new(CHANNEL);
    log.evict_before(RecordNumber(20));
    log.append_many(10);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::End)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 10);

    assert_eq!(drain(&mut rx), (20..=29).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_first_contact_beginning_emits_everything_once() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(5);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 5);
    assert_eq!(tailer.poll_once().await.unwrap(), 0);

    assert_eq!(drain(&mut rx), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_first_contact_end_skips_existing() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(5);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::End)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 0);
    assert_eq!(tailer.cursor().unwrap().next(), RecordNumber(6));

    log.append_many(2);
    assert_eq!(tailer.poll_once().await.unwrap(), 2);
    assert_eq!(drain(&mut rx), vec![6, 7]);
}

#[tokio::test]
async fn test_first_contact_end_on_empty_channel() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::End)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 0);

    log.append_many(1);
    assert_eq!(tailer.poll_once().await.unwrap(), 1);
    assert_eq!(drain(&mut rx), vec![1]);
}

/// Channel whose writer appends one record right after the first metadata
/// query, racing the tailer's first cycle
struct RacingLog {
    log: MockEventLog,
}

struct RacingHandle {
    inner: MockEventLogHandle,
    log: MockEventLog,
    appended: AtomicBool,
}

#[async_trait]
impl EventLogSource for RacingLog {
    type Handle = RacingHandle;

    async fn open(&self, channel: &str) -> Result<Self::Handle, EventLogError> {
        Ok(RacingHandle {
            inner: self.log.open(channel).await?,
            log: self.log.clone(),
            appended: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl EventLogHandle for RacingHandle {
    async fn metadata(&self) -> Result<LogMetadata, EventLogError> {
        let metadata = self.inner.metadata().await?;
        if !self.appended.swap(true, Ordering::SeqCst) {
            self.log.append_message("racer", "written during first contact");
        }
        Ok(metadata)
    }

    async fn read_forward(&self, from: RecordNumber) -> Result<Vec<RawRecord>, EventLogError> {
        self.inner.read_forward(from).await
    }

    async fn read_last(&self) -> Result<Option<RawRecord>, EventLogError> {
        self.inner.read_last().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}

#[tokio::test]
async fn test_first_contact_end_with_concurrent_writer() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(100);

    let source = RacingLog { log: log.clone() };
    let (sink, mut rx) = ChannelSink::new(1024);
    let mut tailer = ChannelTailer::open(&source, sink, config(dir.path(), StartPosition::End))
        .await
        .unwrap();

    assert_eq!(tailer.poll_once().await.unwrap(), 0);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(tailer.cursor().unwrap().next(), RecordNumber(102));

    log.append_many(2);
    assert_eq!(tailer.poll_once().await.unwrap(), 2);
    assert_eq!(drain(&mut rx), vec![102, 103]);
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test]
async fn test_new_records_emitted_in_order() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.evict_before(RecordNumber(100));

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::End)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 0);

    log.append_many(3);
    assert_eq!(tailer.poll_once().await.unwrap(), 3);

    let events: Vec<EventRecord> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    let numbers: Vec<u64> = events.iter().map(|e| e.record_number.value()).collect();
    assert_eq!(numbers, vec![100, 101, 102]);
    assert!(events.iter().all(|e| e.host == "testhost" && e.channel == CHANNEL));
    assert_eq!(tailer.store().get(CHANNEL), Some(RecordNumber(102)));
}

#[tokio::test]
async fn test_unchanged_metadata_skips_read() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(2);

    let (mut tailer, _rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    tailer.poll_once().await.unwrap();
    let reads = log.forward_reads();

    assert_eq!(tailer.poll_once().await.unwrap(), 0);
    assert_eq!(log.forward_reads(), reads);
}

#[tokio::test]
async fn test_full_circular_log_still_detected() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::with_capacity(CHANNEL, 3);
    log.append_many(3);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 3);

    // Total stays at capacity while the oldest record moves
    log.append_many(2);
    assert_eq!(log.metadata().total, 3);
    assert_eq!(tailer.poll_once().await.unwrap(), 2);
    assert_eq!(drain(&mut rx), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_wrap_between_polls_resumes_at_oldest() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::with_capacity(CHANNEL, 3);
    log.append_many(2);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 2);

    // Records 3..=7 are written, 3 and 4 are evicted before we look
    log.append_many(5);
    assert_eq!(tailer.poll_once().await.unwrap(), 3);
    assert_eq!(drain(&mut rx), vec![1, 2, 5, 6, 7]);
}

#[tokio::test]
async fn test_cleared_log_rereads_from_oldest() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(3);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 3);

    log.clear();
    log.append_many(2);
    assert_eq!(tailer.poll_once().await.unwrap(), 2);
    assert_eq!(drain(&mut rx), vec![1, 2, 3, 1, 2]);
    assert_eq!(tailer.store().get(CHANNEL), Some(RecordNumber(2)));
}

#[tokio::test]
async fn test_transient_read_error_is_retried() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(3);

    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;

    log.fail_next(1);
    let err = tailer.poll_once().await.unwrap_err();
    assert!(matches!(err, TailerError::Read(EventLogError::Read(_))));
    assert!(!err.is_fatal());

    assert_eq!(tailer.poll_once().await.unwrap(), 3);
    assert_eq!(drain(&mut rx), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_closed_sink_does_not_advance_offset() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(2);

    let (mut tailer, rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    drop(rx);

    let err = tailer.poll_once().await.unwrap_err();
    assert!(matches!(err, TailerError::Sink(_)));
    assert_eq!(tailer.store().get(CHANNEL), None);
    assert_eq!(tailer.cursor().unwrap().next(), RecordNumber(1));
}

#[tokio::test]
async fn test_loop_recovers_from_transient_errors() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(3);
    log.fail_next(3);

    let (tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    let handle = tailer.spawn();

    assert_eq!(recv_numbers(&mut rx, 3).await, vec![1, 2, 3]);

    log.append_many(1);
    assert_eq!(recv_numbers(&mut rx, 1).await, vec![4]);

    assert!(matches!(handle.shutdown().await, ShutdownOutcome::Completed { .. }));
}

#[tokio::test]
async fn test_pending_offset_written_while_idle() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(3);

    let config = config(dir.path(), StartPosition::Beginning)
        .with_flush_interval(Duration::from_millis(100));
    let (tailer, mut rx) = open(&log, config).await;
    let handle = tailer.spawn();

    recv_numbers(&mut rx, 3).await;

    timeout(WAIT, async {
        while handle.store().write_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pending offset never written");

    let contents = std::fs::read_to_string(dir.path().join("eventlog.sincedb")).unwrap();
    assert_eq!(contents, "Application 3\n");

    handle.shutdown().await;
}

// ============================================================================
// Open
// ============================================================================

#[tokio::test]
async fn test_access_denied_is_fatal() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new("Security");
    log.deny_access();

    let (sink, _rx) = ChannelSink::new(16);
    let config = config(dir.path(), StartPosition::End);
    let config = TailerConfig {
        channel: "Security".into(),
        ..config
    };

    let err = ChannelTailer::open(&log, sink, config).await.err().unwrap();
    assert!(matches!(err, TailerError::Open(EventLogError::AccessDenied(_))));
    assert!(err.is_fatal());
    assert_eq!(log.open_count(), 0);
}

#[tokio::test]
async fn test_unknown_channel_is_fatal() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);

    let (sink, _rx) = ChannelSink::new(16);
    let config = TailerConfig {
        channel: "Nonexistent".into(),
        ..config(dir.path(), StartPosition::End)
    };

    let err = ChannelTailer::open(&log, sink, config).await.err().unwrap();
    assert!(matches!(err, TailerError::Open(EventLogError::ChannelNotFound(_))));
}

#[tokio::test]
async fn test_invalid_config_rejected_before_open() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);

    let (sink, _rx) = ChannelSink::new(16);
    let config = TailerConfig {
        channel: "Windows PowerShell".into(),
        ..config(dir.path(), StartPosition::End)
    };

    let err = ChannelTailer::open(&log, sink, config).await.err().unwrap();
    assert!(matches!(err, TailerError::Config(_)));
    assert_eq!(log.open_count(), 0);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_stop_during_sleep_flushes_once_then_exits() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(3);

    let config = config(dir.path(), StartPosition::Beginning)
        .with_poll_interval(Duration::from_secs(60));
    let (tailer, mut rx) = open(&log, config).await;
    let handle = tailer.spawn();

    assert_eq!(recv_numbers(&mut rx, 3).await, vec![1, 2, 3]);
    timeout(WAIT, async {
        while handle.phase() != TailerPhase::Idle {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let metadata_calls = log.metadata_calls();
    let forward_reads = log.forward_reads();
    assert_eq!(handle.store().write_count(), 0);

    // can_exit must not be observed before the forced flush
    let store = std::sync::Arc::clone(handle.store());
    let exit_waiter = {
        let coordinator = handle.coordinator();
        tokio::spawn(async move {
            coordinator.lifecycle().wait_exit().await;
            store.write_count()
        })
    };

    let outcome = timeout(WAIT, handle.shutdown()).await.unwrap();
    assert!(outcome.flushed());

    assert_eq!(exit_waiter.await.unwrap(), 1);
    assert_eq!(log.metadata_calls(), metadata_calls);
    assert_eq!(log.forward_reads(), forward_reads);
    assert_eq!(log.close_count(), 1);

    let contents = std::fs::read_to_string(dir.path().join("eventlog.sincedb")).unwrap();
    assert_eq!(contents, "Application 3\n");

    timeout(WAIT, handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_second_shutdown_is_noop() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);

    let (tailer, _rx) = open(&log, config(dir.path(), StartPosition::End)).await;
    let handle = tailer.spawn();

    assert!(matches!(handle.shutdown().await, ShutdownOutcome::Completed { .. }));
    assert!(matches!(handle.shutdown().await, ShutdownOutcome::AlreadyRequested));

    assert_eq!(handle.store().write_count(), 1);
    assert_eq!(log.close_count(), 1);
}

#[tokio::test]
async fn test_concurrent_shutdowns_tear_down_once() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(2);

    let (tailer, _rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    let handle = tailer.spawn();

    let a = handle.coordinator();
    let b = handle.coordinator();
    let (first, second) = tokio::join!(a.shutdown(), b.shutdown());

    let completed = [&first, &second]
        .iter()
        .filter(|o| matches!(o, ShutdownOutcome::Completed { .. }))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(handle.store().write_count(), 1);

    timeout(WAIT, handle.join()).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_restart_resumes_after_shutdown() {
    let dir = TempDir::new().unwrap();
    let log = MockEventLog::new(CHANNEL);
    log.append_many(4);

    let (tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    let handle = tailer.spawn();
    assert_eq!(recv_numbers(&mut rx, 4).await, vec![1, 2, 3, 4]);
    handle.shutdown().await;
    timeout(WAIT, handle.join()).await.unwrap().unwrap();

    log.append_many(2);
    let (mut tailer, mut rx) = open(&log, config(dir.path(), StartPosition::Beginning)).await;
    assert_eq!(tailer.poll_once().await.unwrap(), 2);
    assert_eq!(drain(&mut rx), vec![5, 6]);
}
