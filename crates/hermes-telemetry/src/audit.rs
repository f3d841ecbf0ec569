//! Batching audit transport.
//!
//! [`BatchingPublisher`] is the production [`AuditPublisher`]: `publish`
//! only enqueues on a bounded channel and never waits. A single background
//! task drains the channel into batches and hands each batch to an
//! [`AuditSink`].
//!
//! ```text
//! RequestContext ──try_send──▶ [bounded mpsc] ──▶ worker ──▶ AuditSink
//!                                                  │
//!                               flush at max_batch records or max_delay
//! ```
//!
//! A failed batch is retried with exponential backoff up to
//! `max_attempts`, then dropped with an error log. A full queue drops the
//! record at the call site.

use std::sync::Arc;
use std::time::Duration;

use hermes_core::{AuditPublisher, AuditRecord, BoxFuture, PublishError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::SinkError;
use crate::metrics::{record_audit_batch, record_audit_dropped};

/// Batching and retry parameters.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Flush once this many records are buffered.
    pub max_batch: usize,
    /// Flush a non-empty buffer at least this often.
    pub max_delay: Duration,
    /// Capacity of the queue between publishers and the worker.
    pub queue_capacity: usize,
    /// Delivery attempts per batch before it is dropped.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub initial_backoff: Duration,
    /// Upper bound for the retry delay.
    pub max_backoff: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch: 100,
            max_delay: Duration::from_millis(5000),
            queue_capacity: 10_000,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Destination for audit batches.
pub trait AuditSink: Send + Sync + 'static {
    /// Returns the sink name, used in logs.
    fn name(&self) -> &'static str;

    /// Delivers one batch. Called again with the same batch on failure.
    fn ship<'a>(&'a self, batch: &'a [AuditRecord]) -> BoxFuture<'a, Result<(), SinkError>>;
}

/// Encodes a batch as JSON lines.
pub fn encode_json_lines(batch: &[AuditRecord]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for record in batch {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Writes every record to the structured log stream.
///
/// Used when no collector endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn ship<'a>(&'a self, batch: &'a [AuditRecord]) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            for record in batch {
                let json = serde_json::to_string(record)?;
                tracing::info!(
                    target: "hermes::audit",
                    request_id = %record.request_id,
                    sequence_number = record.sequence_number,
                    record = %json,
                    "audit"
                );
            }
            Ok(())
        })
    }
}

/// Posts batches as `application/x-ndjson` to a collector.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    /// Creates a sink posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Returns the collector endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl AuditSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn ship<'a>(&'a self, batch: &'a [AuditRecord]) -> BoxFuture<'a, Result<(), SinkError>> {
        Box::pin(async move {
            let body = encode_json_lines(batch)?;
            let response = self
                .client
                .post(&self.endpoint)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body)
                .send()
                .await
                .map_err(|e| SinkError::Transport(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(SinkError::Rejected {
                    status: status.as_u16(),
                })
            }
        })
    }
}

/// Fire-and-forget publisher backed by a background batching task.
#[derive(Debug, Clone)]
pub struct BatchingPublisher {
    sender: mpsc::Sender<AuditRecord>,
}

/// Handle to the background task spawned by [`BatchingPublisher::spawn`].
#[derive(Debug)]
pub struct AuditWorker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl BatchingPublisher {
    /// Spawns the batching task on the current runtime.
    pub fn spawn(sink: Arc<dyn AuditSink>, config: BatchConfig) -> (Self, AuditWorker) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tracing::debug!(
            sink = sink.name(),
            max_batch = config.max_batch,
            max_delay_ms = u64::try_from(config.max_delay.as_millis()).unwrap_or(u64::MAX),
            "audit worker starting"
        );
        let handle = tokio::spawn(run_worker(receiver, sink, config, shutdown_rx));

        (
            Self { sender },
            AuditWorker {
                shutdown: shutdown_tx,
                handle,
            },
        )
    }
}

impl AuditPublisher for BatchingPublisher {
    fn publish(&self, record: AuditRecord) -> Result<(), PublishError> {
        self.sender.try_send(record).map_err(|error| {
            record_audit_dropped(1);
            match error {
                mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => PublishError::Closed,
            }
        })
    }
}

impl AuditWorker {
    /// Stops accepting records, flushes what is queued and waits for the
    /// task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        if let Err(error) = self.handle.await {
            tracing::error!(error = %error, "audit worker panicked");
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<AuditRecord>,
    sink: Arc<dyn AuditSink>,
    config: BatchConfig,
    mut shutdown: oneshot::Receiver<()>,
) {
    let max_batch = config.max_batch.max(1);
    let mut batch = Vec::with_capacity(max_batch);
    let mut ticker = tokio::time::interval(config.max_delay.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    // A dropped worker handle detaches the task; it then runs until every
    // publisher is gone.
    let mut detached = false;

    loop {
        tokio::select! {
            maybe = receiver.recv() => match maybe {
                Some(record) => {
                    batch.push(record);
                    if batch.len() >= max_batch {
                        flush(sink.as_ref(), &mut batch, &config).await;
                        ticker.reset();
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(sink.as_ref(), &mut batch, &config).await;
                }
            }
            signal = &mut shutdown, if !detached => {
                if signal.is_err() {
                    detached = true;
                    continue;
                }
                receiver.close();
                while let Some(record) = receiver.recv().await {
                    batch.push(record);
                    if batch.len() >= max_batch {
                        flush(sink.as_ref(), &mut batch, &config).await;
                    }
                }
                break;
            }
        }
    }

    if !batch.is_empty() {
        flush(sink.as_ref(), &mut batch, &config).await;
    }
    tracing::debug!(sink = sink.name(), "audit worker stopped");
}

async fn flush(sink: &dyn AuditSink, batch: &mut Vec<AuditRecord>, config: &BatchConfig) {
    let records = std::mem::take(batch);
    let attempts = config.max_attempts.max(1);
    let mut backoff = config.initial_backoff;

    for attempt in 1..=attempts {
        match sink.ship(&records).await {
            Ok(()) => {
                record_audit_batch("shipped");
                tracing::debug!(sink = sink.name(), records = records.len(), "audit batch shipped");
                return;
            }
            Err(error) if attempt < attempts => {
                tracing::warn!(
                    sink = sink.name(),
                    attempt,
                    error = %error,
                    retry_in_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "audit batch failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
            Err(error) => {
                record_audit_batch("dropped");
                record_audit_dropped(records.len() as u64);
                tracing::error!(
                    sink = sink.name(),
                    attempts,
                    records = records.len(),
                    error = %error,
                    "audit batch dropped"
                );
            }
        }
    }
}
