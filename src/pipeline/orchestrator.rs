//! End-to-end run orchestration.
//!
//! A run wires the stages together: load the word list, drop words already
//! stored, fan pending words out to the worker pool, and funnel validated
//! results through the single batch writer. The database opens before any
//! work starts; an unopenable store is the one fatal startup condition.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dedup;
use crate::error::SourceError;
use crate::llm::Generator;
use crate::prompts::PromptSpec;
use crate::scheduler::{WorkerConfig, WorkerPool};
use crate::source::load_word_list;
use crate::storage::{BatchWriter, Database, DatabaseError, WriterMessage};

use super::config::{ConfigError, PipelineConfig};

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Word list error: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Writer task panicked: {0}")]
    WriterPanicked(String),
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Words in the input file after input-level deduplication.
    pub total: usize,
    /// Words skipped because the store already had them.
    pub skipped: usize,
    /// Words handed to the worker pool.
    pub attempted: usize,
    /// Records committed by the writer.
    pub stored: u64,
    /// Words that exhausted their attempts.
    pub failed: u64,
    /// The failed words, for operator follow-up.
    pub failed_words: Vec<String>,
}

/// The assembled pipeline: configuration, generator, and an open store.
pub struct Pipeline {
    config: PipelineConfig,
    generator: Arc<dyn Generator>,
    db: Database,
}

impl Pipeline {
    /// Validates the configuration and opens the database.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` for an invalid configuration and
    /// `PipelineError::Database` when the store cannot be opened or created.
    pub async fn new(
        config: PipelineConfig,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let db = Database::open(&config.database_path).await?;
        Ok(Self {
            config,
            generator,
            db,
        })
    }

    /// Runs the pipeline over the word list at `source`.
    ///
    /// Completed entries are never regenerated: the store is scanned once at
    /// startup and already-present words are skipped, so interrupting a run
    /// and restarting it resumes where the committed batches left off.
    ///
    /// # Errors
    ///
    /// Returns an error when the word list is unreadable or empty, or when
    /// the final drain cannot commit buffered results.
    pub async fn run(&self, source: &Path, prompt: PromptSpec) -> Result<RunSummary, PipelineError> {
        let tasks = load_word_list(source)?;
        let total = tasks.len();

        let existing = self.db.existing_words().await;
        let pending = dedup::filter_pending(tasks, &existing);
        let skipped = total - pending.len();

        info!(
            total,
            skipped,
            pending = pending.len(),
            "Word list loaded"
        );

        if pending.is_empty() {
            info!("Nothing to generate, store is up to date");
            return Ok(RunSummary {
                total,
                skipped,
                attempted: 0,
                stored: 0,
                failed: 0,
                failed_words: Vec::new(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let writer = BatchWriter::new(
            self.db.clone(),
            self.config.batch_size,
            self.config.flush_interval,
        );
        let writer_handle = tokio::spawn(writer.run(rx));

        let pool = WorkerPool::new(
            WorkerConfig {
                concurrency: self.config.concurrency,
                max_attempts: self.config.max_attempts,
                model: self.config.model.clone(),
                temperature: self.config.temperature,
                backoff: self.config.backoff.clone(),
            },
            Arc::clone(&self.generator),
            prompt,
        );

        let pool_stats = pool.run(pending, tx.clone()).await;

        // Workers are done; the sentinel queues behind their last results so
        // the writer drains everything before stopping.
        if tx.send(WriterMessage::Shutdown).await.is_err() {
            warn!("Writer stopped before shutdown signal");
        }
        drop(tx);

        let stored = match writer_handle.await {
            Ok(result) => result?,
            Err(e) => return Err(PipelineError::WriterPanicked(e.to_string())),
        };

        let summary = RunSummary {
            total,
            skipped,
            attempted: pool_stats.attempted,
            stored,
            failed: pool_stats.failed,
            failed_words: pool_stats.failed_words,
        };

        info!(
            attempted = summary.attempted,
            stored = summary.stored,
            failed = summary.failed,
            skipped = summary.skipped,
            "Run complete"
        );
        if !summary.failed_words.is_empty() {
            warn!(words = ?summary.failed_words, "Words that exhausted their attempts");
        }

        Ok(summary)
    }
}
