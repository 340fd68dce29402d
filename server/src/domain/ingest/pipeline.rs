//! Batch ingest loop
//!
//! Every telemetry kind runs the same loop:
//!
//! ```text
//! topic ──read_batch──▶ flatten ──chunk──▶ persist (per chunk)
//! ```
//!
//! A chunk that fails to persist is logged and dropped; the loop moves on to
//! the next chunk. On shutdown the queue is drained before the task exits,
//! including messages a cancelled `read_batch` had already dequeued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::data::DataError;
use crate::data::topics::{ReadGrace, Subscriber, Topic, TopicError, TopicMessage};

/// How long a shutdown drain waits for the next queued batch
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);

// ============================================================================
// SETTINGS
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct IngestSettings {
    /// Export requests read per batch
    pub batch_size: usize,
    /// Leaf records per persisted chunk
    pub chunk_size: usize,
    pub grace: ReadGrace,
    pub persist_timeout: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            chunk_size: 2000,
            grace: ReadGrace::new(3, Duration::from_millis(100)),
            persist_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// SINK
// ============================================================================

/// Per-kind flattening and storage
#[async_trait]
pub trait IngestSink: Send + Sync + 'static {
    type Request: TopicMessage;
    type Row: Send + Sync + 'static;

    /// Pipeline name used in logs
    fn name(&self) -> &'static str;

    /// Backend name used for timeout errors
    fn backend_name(&self) -> &'static str;

    /// Leaf records of a batch, in request order
    fn flatten(&self, requests: &[Self::Request]) -> Vec<Self::Row>;

    async fn persist(&self, chunk: &[Self::Row]) -> Result<(), DataError>;
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct IngestPipeline<S: IngestSink> {
    sink: Arc<S>,
    settings: IngestSettings,
}

impl<S: IngestSink> IngestPipeline<S> {
    pub fn new(sink: S, settings: IngestSettings) -> Self {
        Self {
            sink: Arc::new(sink),
            settings,
        }
    }

    pub fn start(
        self,
        topic: &Topic<S::Request>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, TopicError> {
        let mut subscriber = topic.subscribe()?;
        let name = self.sink.name();

        Ok(tokio::spawn(async move {
            let mut shutdown_requested = false;

            loop {
                if shutdown_requested {
                    self.drain(&mut subscriber).await;
                    break;
                }

                tokio::select! {
                    biased;
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!(pipeline = name, "Pipeline received shutdown, draining...");
                            shutdown_requested = true;
                        }
                    }
                    batch = subscriber.read_batch(self.settings.batch_size, self.settings.grace) => {
                        match batch {
                            Some(batch) => self.process(&batch).await,
                            None => break,
                        }
                    }
                }
            }
            tracing::debug!(pipeline = name, "Pipeline shutdown complete");
        }))
    }

    /// Persist whatever is still queued, one bounded read at a time
    async fn drain(&self, subscriber: &mut Subscriber<S::Request>) {
        let no_grace = ReadGrace::new(0, Duration::ZERO);
        loop {
            match tokio::time::timeout(
                DRAIN_TIMEOUT,
                subscriber.read_batch(self.settings.batch_size, no_grace),
            )
            .await
            {
                Ok(Some(batch)) => self.process(&batch).await,
                _ => break,
            }
        }
    }

    /// Flatten a batch and persist it chunk by chunk
    pub async fn process(&self, batch: &[S::Request]) {
        let rows = self.sink.flatten(batch);
        if rows.is_empty() {
            return;
        }
        tracing::debug!(
            pipeline = self.sink.name(),
            requests = batch.len(),
            records = rows.len(),
            "Processing ingest batch"
        );
        for chunk in rows.chunks(self.settings.chunk_size.max(1)) {
            self.persist_chunk(chunk).await;
        }
    }

    async fn persist_chunk(&self, chunk: &[S::Row]) {
        let timeout = self.settings.persist_timeout;
        let result = match tokio::time::timeout(timeout, self.sink.persist(chunk)).await {
            Ok(result) => result,
            Err(_) => Err(DataError::timeout(
                self.sink.backend_name(),
                timeout.as_secs(),
            )),
        };

        match result {
            Ok(()) => {
                tracing::debug!(
                    pipeline = self.sink.name(),
                    records = chunk.len(),
                    "Persisted chunk"
                );
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    pipeline = self.sink.name(),
                    records = chunk.len(),
                    "Failed to persist chunk"
                );
            }
        }
    }
}
