//! Worker pool for concurrent entry generation.
//!
//! A fixed number of workers pull words from a shared queue, call the
//! generator with per-item retries, validate the response, and hand
//! validated results to the writer channel. A failure of one word never
//! affects another: the item is recorded as failed and the worker moves on.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::llm::{GenerationRequest, Generator};
use crate::prompts::PromptSpec;
use crate::source::WordTask;
use crate::storage::{EntryResult, WriterMessage};
use crate::validator;

use super::backoff::BackoffPolicy;

/// Generation parameters shared by every worker in a pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Attempts per word before recording a permanent failure.
    pub max_attempts: u32,
    /// Model identifier passed to the generator.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Retry delay policy.
    pub backoff: BackoffPolicy,
}

/// Final counters for one pool run.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Words taken off the queue.
    pub attempted: usize,
    /// Words that produced a validated result.
    pub succeeded: u64,
    /// Words that exhausted their attempts.
    pub failed: u64,
    /// The failed words, for the end-of-run report.
    pub failed_words: Vec<String>,
}

#[derive(Debug, Default)]
struct SharedPoolStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    failed_words: Mutex<Vec<String>>,
}

impl SharedPoolStats {
    fn record_success(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure(&self, word: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut failed_words) = self.failed_words.lock() {
            failed_words.push(word.to_string());
        }
    }

    fn snapshot(&self, attempted: usize) -> PoolStats {
        let failed_words = self
            .failed_words
            .lock()
            .map(|words| words.clone())
            .unwrap_or_default();

        PoolStats {
            attempted,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            failed_words,
        }
    }
}

type TaskQueue = Arc<Mutex<VecDeque<WordTask>>>;

/// Pool of generation workers over a shared word queue.
pub struct WorkerPool {
    config: WorkerConfig,
    generator: Arc<dyn Generator>,
    prompt: Arc<PromptSpec>,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, generator: Arc<dyn Generator>, prompt: PromptSpec) -> Self {
        Self {
            config,
            generator,
            prompt: Arc::new(prompt),
        }
    }

    /// Processes every task, sending validated results to `tx`. Returns once
    /// all workers have drained the queue.
    ///
    /// The channel send applies backpressure: when the writer falls behind,
    /// workers block on a full channel instead of accumulating results in
    /// memory.
    pub async fn run(&self, tasks: Vec<WordTask>, tx: mpsc::Sender<WriterMessage>) -> PoolStats {
        let total = tasks.len();
        if total == 0 {
            return PoolStats {
                attempted: 0,
                succeeded: 0,
                failed: 0,
                failed_words: Vec::new(),
            };
        }

        let queue: TaskQueue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let stats = Arc::new(SharedPoolStats::default());
        let worker_count = self.config.concurrency.min(total);

        info!(total, workers = worker_count, "Starting worker pool");

        let mut handles = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let worker = Worker {
                id: format!("worker-{}", i),
                config: self.config.clone(),
                generator: Arc::clone(&self.generator),
                prompt: Arc::clone(&self.prompt),
                queue: Arc::clone(&queue),
                tx: tx.clone(),
                stats: Arc::clone(&stats),
            };
            handles.push(tokio::spawn(worker.run()));
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }

        stats.snapshot(total)
    }
}

struct Worker {
    id: String,
    config: WorkerConfig,
    generator: Arc<dyn Generator>,
    prompt: Arc<PromptSpec>,
    queue: TaskQueue,
    tx: mpsc::Sender<WriterMessage>,
    stats: Arc<SharedPoolStats>,
}

impl Worker {
    async fn run(self) {
        loop {
            let task = match self.queue.lock() {
                Ok(mut queue) => queue.pop_front(),
                Err(_) => {
                    error!(worker_id = %self.id, "Task queue lock poisoned, stopping worker");
                    return;
                }
            };

            match task {
                Some(task) => self.process(task).await,
                None => {
                    debug!(worker_id = %self.id, "Queue empty, worker exiting");
                    return;
                }
            }
        }
    }

    /// Attempts one word up to `max_attempts` times, classifying each
    /// failure to pick its delay, then records a permanent failure.
    async fn process(&self, task: WordTask) {
        let mut last_error = String::new();

        for attempt in 1..=self.config.max_attempts {
            let request = GenerationRequest::new(
                &self.config.model,
                &self.prompt.system,
                self.prompt.render(&task.word),
                self.config.temperature,
            );

            let raw = match self.generator.generate(request).await {
                Ok(raw) => raw,
                Err(e) => {
                    last_error = e.to_string();
                    let delay = self.config.backoff.delay(attempt);
                    if e.is_throttle() {
                        warn!(
                            worker_id = %self.id,
                            word = %task.word,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Rate limited, backing off"
                        );
                    } else {
                        warn!(
                            worker_id = %self.id,
                            word = %task.word,
                            attempt,
                            error = %e,
                            "Generation attempt failed"
                        );
                    }
                    self.sleep_before_retry(attempt, delay).await;
                    continue;
                }
            };

            match validator::validate(&raw) {
                Ok((payload, _)) => {
                    let keywords = derive_keywords(&task.word, &payload);
                    let result = EntryResult {
                        word: task.word.clone(),
                        keywords,
                        payload,
                    };

                    if self.tx.send(WriterMessage::Entry(result)).await.is_err() {
                        error!(
                            worker_id = %self.id,
                            word = %task.word,
                            "Writer channel closed, dropping result"
                        );
                        self.stats.record_failure(&task.word);
                        return;
                    }

                    debug!(worker_id = %self.id, word = %task.word, attempt, "Entry generated");
                    self.stats.record_success();
                    return;
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        worker_id = %self.id,
                        word = %task.word,
                        attempt,
                        error = %e,
                        "Response failed validation"
                    );
                    self.sleep_before_retry(attempt, self.config.backoff.parse_retry).await;
                }
            }
        }

        error!(
            worker_id = %self.id,
            word = %task.word,
            attempts = self.config.max_attempts,
            error = %last_error,
            "Giving up on word"
        );
        self.stats.record_failure(&task.word);
    }

    async fn sleep_before_retry(&self, attempt: u32, delay: Duration) {
        if attempt < self.config.max_attempts {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Derives the keyword list for a validated document: the case-folded
/// headword first (always present), followed by any `search_keywords` the
/// document carries, case-folded and deduplicated in order.
fn derive_keywords(word: &str, payload: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    let folded = word.to_lowercase();
    seen.insert(folded.clone());
    keywords.push(folded);

    if let Some(items) = payload.get("search_keywords").and_then(Value::as_array) {
        for item in items {
            if let Some(s) = item.as_str() {
                let keyword = s.trim().to_lowercase();
                if !keyword.is_empty() && seen.insert(keyword.clone()) {
                    keywords.push(keyword);
                }
            }
        }
    }

    keywords
}
