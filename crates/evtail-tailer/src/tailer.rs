//! Poll loop for one event log channel
//!
//! A [`ChannelTailer`] owns the read cursor for its channel. Each cycle it
//! asks the log whether its retention window changed, reads every record
//! newer than the cursor, and hands them to the sink in ascending order.
//! The offset store is updated after each emit, so a crash replays at most
//! the records written since the last successful flush.

use std::sync::Arc;

use evtail_core::{
    EventLogError, EventLogHandle, EventLogSource, EventRecord, EventSink, LogMetadata,
};
use evtail_storage::OffsetStore;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TailerConfig;
use crate::cursor::{ReadCursor, Reconciled, StartDecision, decide_start};
use crate::error::{TailerError, TailerResult};
use crate::lifecycle::TailerLifecycle;
use crate::shutdown::ShutdownCoordinator;
use crate::TailerHandle;

/// Tails a single channel into a sink
pub struct ChannelTailer<H: EventLogHandle, K: EventSink> {
    config: TailerConfig,
    /// Host name stamped on every emitted event
    host: String,
    handle: Arc<H>,
    sink: K,
    store: Arc<OffsetStore>,
    /// Established on the first successful cycle
    cursor: Option<ReadCursor>,
    /// Metadata seen by the last completed read
    last_meta: Option<LogMetadata>,
    lifecycle: Arc<TailerLifecycle>,
}

impl<H, K> ChannelTailer<H, K>
where
    H: EventLogHandle,
    K: EventSink + 'static,
{
    /// Open `config.channel` on `source` with its own offset store
    ///
    /// The offset file is loaded from [`TailerConfig::resolved_offset_path`].
    /// Any open failure is fatal.
    #[instrument(skip(source, sink, config), fields(channel = %config.channel))]
    pub async fn open<S>(source: &S, sink: K, config: TailerConfig) -> TailerResult<Self>
    where
        S: EventLogSource<Handle = H>,
    {
        config.validate()?;
        let store = OffsetStore::load(config.resolved_offset_path(), config.flush_interval()).await;
        Self::open_with_store(source, sink, config, Arc::new(store)).await
    }

    /// Open a channel that shares an existing offset store
    ///
    /// Several tailers may share one store; each only touches its own
    /// channel's entry.
    pub async fn open_with_store<S>(
        source: &S,
        sink: K,
        config: TailerConfig,
        store: Arc<OffsetStore>,
    ) -> TailerResult<Self>
    where
        S: EventLogSource<Handle = H>,
    {
        config.validate()?;

        let handle = match source.open(&config.channel).await {
            Ok(handle) => handle,
            Err(e @ EventLogError::AccessDenied(_)) => {
                error!(channel = %config.channel, "No privilege held to open channel");
                return Err(TailerError::Open(e));
            }
            Err(e) => {
                error!(channel = %config.channel, error = %e, "Failed to open channel");
                return Err(TailerError::Open(e));
            }
        };

        info!(
            channel = %config.channel,
            offset_path = %store.path().display(),
            saved = ?store.get(&config.channel).map(|n| n.value()),
            start_position = %config.start_position,
            "Opened channel"
        );

        Ok(Self {
            host: config.resolved_host(),
            config,
            handle: Arc::new(handle),
            sink,
            store,
            cursor: None,
            last_meta: None,
            lifecycle: Arc::new(TailerLifecycle::new()),
        })
    }

    pub fn channel(&self) -> &str {
        &self.config.channel
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<OffsetStore> {
        &self.store
    }

    pub fn lifecycle(&self) -> &Arc<TailerLifecycle> {
        &self.lifecycle
    }

    /// Current read position, once established
    pub fn cursor(&self) -> Option<ReadCursor> {
        self.cursor
    }

    /// Coordinator that can stop this tailer from another task
    pub fn coordinator(&self) -> ShutdownCoordinator {
        ShutdownCoordinator::new(
            self.config.channel.clone(),
            Arc::clone(&self.lifecycle),
            Arc::clone(&self.store),
            Arc::clone(&self.handle) as Arc<dyn EventLogHandle>,
        )
    }

    /// Run one read cycle, returning the number of records emitted
    ///
    /// Establishes the cursor on first use. Returns `Ok(0)` without reading
    /// when the log's metadata has not changed since the last cycle.
    pub async fn poll_once(&mut self) -> TailerResult<usize> {
        let Self {
            config,
            host,
            handle,
            sink,
            store,
            cursor,
            last_meta,
            ..
        } = self;
        let channel = config.channel.as_str();

        let mut metadata = handle.metadata().await?;

        let cursor = match cursor {
            Some(cursor) => cursor,
            None => {
                let (start, observed) =
                    establish_cursor(handle.as_ref(), channel, store, config, metadata).await?;
                metadata = observed;
                cursor.insert(start)
            }
        };

        if *last_meta == Some(metadata) {
            return Ok(0);
        }

        match cursor.reconcile(metadata) {
            Reconciled::InRange => {}
            Reconciled::Wrapped { lost } => {
                warn!(
                    channel,
                    lost,
                    oldest = metadata.oldest.value(),
                    "Log wrapped past unread records"
                );
            }
            Reconciled::Truncated { newest } => {
                warn!(
                    channel,
                    newest = ?newest.map(|n| n.value()),
                    oldest = metadata.oldest.value(),
                    "Log was cleared, rereading from oldest record"
                );
            }
        }

        let records = handle.read_forward(cursor.next()).await?;
        let mut emitted = 0;

        for raw in records {
            let number = raw.record_number;
            if !cursor.is_new(number) {
                continue;
            }

            sink.emit(EventRecord::from_raw(host, channel, &raw)).await?;
            store.record(channel, number);
            store.flush(false).await;
            cursor.advance(number);
            emitted += 1;
        }

        *last_meta = Some(metadata);

        if emitted > 0 {
            debug!(channel, emitted, next = cursor.next().value(), "Emitted records");
        }
        Ok(emitted)
    }

    /// Poll until a stop is requested
    ///
    /// Read and sink errors are logged and retried after the configured
    /// backoff; they never end the loop.
    #[instrument(skip(self), fields(channel = %self.config.channel))]
    pub async fn run(mut self) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            "Tailer started"
        );

        loop {
            if !self.lifecycle.begin_cycle() {
                break;
            }

            let result = self.poll_once().await;

            // Idle flush stays inside the cycle so it cannot overlap the
            // forced flush at shutdown.
            if result.is_ok() && self.store.is_pending() {
                self.store.flush(false).await;
            }

            self.lifecycle.end_cycle();

            let delay = match result {
                Ok(_) => self.config.poll_interval(),
                Err(e) => {
                    error!(
                        error = %e,
                        retry_ms = self.config.retry_backoff_ms,
                        "Poll cycle failed"
                    );
                    self.config.retry_backoff()
                }
            };

            if self.lifecycle.sleep(delay).await {
                break;
            }
        }

        self.lifecycle.mark_stopped();
        info!("Tailer stopped");
    }

    /// Run the poll loop on a new task
    pub fn spawn(self) -> TailerHandle {
        let coordinator = self.coordinator();
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(self.run());
        TailerHandle::new(coordinator, store, task)
    }
}

/// Pick the starting cursor for a channel on its first cycle
///
/// Returns the cursor with metadata at least as new as the position it was
/// derived from. Reconciling an end-of-log cursor against metadata taken
/// before `read_last` would mistake records appended in between for a
/// cleared log.
async fn establish_cursor<H: EventLogHandle>(
    handle: &H,
    channel: &str,
    store: &OffsetStore,
    config: &TailerConfig,
    metadata: LogMetadata,
) -> TailerResult<(ReadCursor, LogMetadata)> {
    let decision = decide_start(store.get(channel), metadata, config.start_position);

    let cursor = match decision {
        StartDecision::Resume { next } => {
            info!(channel, next = next.value(), "Resuming from saved offset");
            ReadCursor::at(next)
        }
        StartDecision::RolledOver { saved, oldest } => {
            warn!(
                channel,
                saved = saved.value(),
                oldest = oldest.value(),
                "Saved offset was rolled over, starting at oldest record"
            );
            ReadCursor::at(oldest)
        }
        StartDecision::Beginning { oldest } => {
            info!(channel, oldest = oldest.value(), "Reading channel from the beginning");
            ReadCursor::at(oldest)
        }
        StartDecision::End => {
            let cursor = match handle.read_last().await? {
                Some(last) => {
                    info!(
                        channel,
                        newest = last.record_number.value(),
                        "Skipping existing records"
                    );
                    ReadCursor::after(last.record_number)
                }
                None => ReadCursor::at(metadata.next_record()),
            };
            return Ok((cursor, handle.metadata().await?));
        }
    };

    Ok((cursor, metadata))
}
