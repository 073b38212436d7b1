//! Single-writer batching stage.
//!
//! Workers send validated results over a bounded channel; one writer task
//! owns the database write path, accumulating results and flushing them in
//! transactional batches. A flush happens when the buffer reaches the batch
//! size or when the flush interval has elapsed with data pending, whichever
//! comes first. An explicit `Shutdown` sentinel (queued behind any in-flight
//! results) tells the writer to drain and stop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::database::{Database, DatabaseError, EntryRecord};

/// How many times the final drain retries a failing flush before the run is
/// declared failed.
const FINAL_FLUSH_RETRIES: u32 = 3;

/// Pause between final-drain retry attempts.
const FINAL_FLUSH_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Message from workers to the writer task.
#[derive(Debug)]
pub enum WriterMessage {
    /// A validated result to persist.
    Entry(EntryResult),
    /// End of input; drain the buffer and stop.
    Shutdown,
}

/// A validated generation result pending persistence.
#[derive(Debug, Clone)]
pub struct EntryResult {
    /// Headword the entry was generated for.
    pub word: String,
    /// Case-folded search keywords, headword first.
    pub keywords: Vec<String>,
    /// The validated payload document.
    pub payload: Value,
}

impl EntryResult {
    /// Converts the result into a database record.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Serialization` if the payload cannot be
    /// serialized (which `serde_json::Value` never fails at in practice).
    pub fn into_record(self) -> Result<EntryRecord, DatabaseError> {
        let data = serde_json::to_string(&self.payload)?;
        Ok(EntryRecord {
            word: self.word,
            keywords: self.keywords.join(" "),
            data,
            created_at: Utc::now(),
        })
    }
}

/// Shared counters for observing writer behavior.
#[derive(Debug, Default)]
pub struct WriterStats {
    flushes: AtomicU64,
    records_written: AtomicU64,
}

impl WriterStats {
    /// Number of successful flushes so far.
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Number of records committed so far.
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    fn record_flush(&self, records: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.records_written.fetch_add(records, Ordering::Relaxed);
    }
}

/// The single writer task. Owns all database writes for a run.
pub struct BatchWriter {
    db: Database,
    batch_size: usize,
    flush_interval: Duration,
    stats: Arc<WriterStats>,
}

impl BatchWriter {
    /// Creates a writer flushing at `batch_size` buffered records or after
    /// `flush_interval` with data pending.
    pub fn new(db: Database, batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            db,
            batch_size,
            flush_interval,
            stats: Arc::new(WriterStats::default()),
        }
    }

    /// Returns a handle to the writer's counters.
    pub fn stats(&self) -> Arc<WriterStats> {
        Arc::clone(&self.stats)
    }

    /// Consumes messages until `Shutdown` (or until every sender is dropped),
    /// then drains whatever is buffered.
    ///
    /// A failed flush keeps the buffer intact and retries on the next
    /// trigger. During the final drain, up to `FINAL_FLUSH_RETRIES` retries
    /// are attempted before the error is returned; at that point the results
    /// were never committed and a later run will regenerate them.
    ///
    /// Returns the number of records committed.
    pub async fn run(self, mut rx: mpsc::Receiver<WriterMessage>) -> Result<u64, DatabaseError> {
        let mut buffer: Vec<EntryRecord> = Vec::with_capacity(self.batch_size);
        let mut last_flush = Instant::now();

        loop {
            match tokio::time::timeout(self.flush_interval, rx.recv()).await {
                Ok(Some(WriterMessage::Entry(result))) => {
                    match result.into_record() {
                        Ok(record) => buffer.push(record),
                        Err(e) => warn!(error = %e, "Dropping unserializable result"),
                    }

                    if buffer.len() >= self.batch_size
                        || (!buffer.is_empty() && last_flush.elapsed() >= self.flush_interval)
                    {
                        self.try_flush(&mut buffer, &mut last_flush).await;
                    }
                }
                Ok(Some(WriterMessage::Shutdown)) | Ok(None) => break,
                Err(_) => {
                    if !buffer.is_empty() && last_flush.elapsed() >= self.flush_interval {
                        self.try_flush(&mut buffer, &mut last_flush).await;
                    }
                }
            }
        }

        self.final_drain(&mut buffer).await?;

        let written = self.stats.records_written();
        info!(
            records = written,
            flushes = self.stats.flushes(),
            "Writer finished"
        );
        Ok(written)
    }

    /// Flushes the buffer, keeping it intact on failure so the records get
    /// another chance on the next trigger.
    async fn try_flush(&self, buffer: &mut Vec<EntryRecord>, last_flush: &mut Instant) {
        match self.db.upsert_entries(buffer).await {
            Ok(()) => {
                debug!(records = buffer.len(), "Flushed batch");
                self.stats.record_flush(buffer.len() as u64);
                buffer.clear();
                *last_flush = Instant::now();
            }
            Err(e) => {
                warn!(
                    error = %e,
                    buffered = buffer.len(),
                    "Batch flush failed, retaining buffer for retry"
                );
            }
        }
    }

    async fn final_drain(&self, buffer: &mut Vec<EntryRecord>) -> Result<(), DatabaseError> {
        let mut attempt = 0u32;

        while !buffer.is_empty() {
            match self.db.upsert_entries(buffer).await {
                Ok(()) => {
                    self.stats.record_flush(buffer.len() as u64);
                    buffer.clear();
                }
                Err(e) if attempt < FINAL_FLUSH_RETRIES => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        buffered = buffer.len(),
                        "Final flush failed, retrying"
                    );
                    tokio::time::sleep(FINAL_FLUSH_RETRY_DELAY).await;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
