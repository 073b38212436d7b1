//! End-to-end pipeline tests over a scripted generator and temporary
//! SQLite databases.

use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use lexforge::error::LlmError;
use lexforge::llm::{GenerationRequest, Generator};
use lexforge::pipeline::{Pipeline, PipelineConfig};
use lexforge::prompts::PromptSpec;
use lexforge::scheduler::BackoffPolicy;
use lexforge::storage::Database;

/// Scripted generator: the prompt template is the bare `{word}`, so each
/// request's user prompt identifies the word being generated.
#[derive(Default)]
struct ScriptedGenerator {
    /// Words that fail with a rate-limit error on every attempt.
    always_throttled: HashSet<String>,
    /// Words whose response wraps the JSON in prose.
    prose_wrapped: HashSet<String>,
    /// Words whose response carries a trailing comma.
    trailing_comma: HashSet<String>,
    /// Total generate calls, across all words and attempts.
    calls: AtomicU64,
}

impl ScriptedGenerator {
    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let word = request.user_prompt;

        if self.always_throttled.contains(&word) {
            return Err(LlmError::RateLimited("try again later".to_string()));
        }

        let body = format!(
            r#"{{"word": "{}", "senses": [{{"pos": "n.", "definition": "a {}"}}], "search_keywords": ["{}", "{}s"]}}"#,
            word, word, word, word
        );

        if self.prose_wrapped.contains(&word) {
            return Ok(format!("Sure! Here is the entry:\n{}\nHope that helps.", body));
        }
        if self.trailing_comma.contains(&word) {
            // Re-emit with a trailing comma before the closing brace.
            let defective = format!("{},}}", &body[..body.len() - 1]);
            return Ok(defective);
        }

        Ok(body)
    }
}

fn word_prompt() -> PromptSpec {
    PromptSpec::new("system", "{word}")
}

fn fast_backoff() -> BackoffPolicy {
    BackoffPolicy {
        base: Duration::from_millis(1),
        multiplier: 2.0,
        max: Duration::from_millis(4),
        parse_retry: Duration::from_millis(1),
    }
}

fn test_config(db_path: PathBuf) -> PipelineConfig {
    let mut config = PipelineConfig::default()
        .with_database_path(db_path)
        .with_concurrency(8)
        .with_model("test-model");
    config.backoff = fast_backoff();
    config
}

fn write_word_list(dir: &TempDir, words: &[&str]) -> PathBuf {
    let path = dir.path().join("words.txt");
    let mut file = std::fs::File::create(&path).expect("create word list");
    for word in words {
        writeln!(file, "{}", word).expect("write word");
    }
    path
}

async fn run_pipeline(
    dir: &TempDir,
    generator: Arc<ScriptedGenerator>,
    words: &[&str],
) -> (lexforge::pipeline::RunSummary, Database) {
    let db_path = dir.path().join("test.db");
    let source = write_word_list(dir, words);

    let pipeline = Pipeline::new(test_config(db_path.clone()), generator)
        .await
        .expect("pipeline construction");
    let summary = pipeline
        .run(&source, word_prompt())
        .await
        .expect("run should complete");

    let db = Database::open(&db_path).await.expect("reopen database");
    (summary, db)
}

#[tokio::test]
async fn every_word_lands_exactly_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let words: Vec<String> = (0..40).map(|i| format!("word{:02}", i)).collect();
    let refs: Vec<&str> = words.iter().map(String::as_str).collect();

    let (summary, db) = run_pipeline(&dir, Arc::new(ScriptedGenerator::default()), &refs).await;

    assert_eq!(summary.attempted, 40);
    assert_eq!(summary.stored, 40);
    assert_eq!(summary.failed, 0);
    assert_eq!(db.count_entries().await.expect("count"), 40);

    let entry = db
        .get_entry("word07")
        .await
        .expect("get")
        .expect("entry present");
    assert!(entry.keywords.starts_with("word07"));
    assert!(entry.data.contains("\"senses\""));
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("test.db");
    let source = write_word_list(&dir, &["alpha", "beta", "gamma"]);

    let generator = Arc::new(ScriptedGenerator::default());
    let generator_handle: Arc<dyn Generator> = Arc::clone(&generator) as Arc<dyn Generator>;
    let pipeline = Pipeline::new(test_config(db_path.clone()), generator_handle)
        .await
        .expect("pipeline construction");

    let first = pipeline.run(&source, word_prompt()).await.expect("first run");
    assert_eq!(first.stored, 3);
    let calls_after_first = generator.calls();

    let second = pipeline.run(&source, word_prompt()).await.expect("second run");
    assert_eq!(second.attempted, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.stored, 0);
    // No generator traffic for already-stored words.
    assert_eq!(generator.calls(), calls_after_first);

    let db = Database::open(&db_path).await.expect("reopen");
    assert_eq!(db.count_entries().await.expect("count"), 3);
}

#[tokio::test]
async fn interrupted_run_resumes_where_it_left_off() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db_path = dir.path().join("test.db");
    let source = write_word_list(&dir, &["one", "two", "three", "four"]);

    // Simulate a prior partial run by seeding two of the words.
    {
        let db = Database::open(&db_path).await.expect("open");
        let seeded = ["one", "three"].map(|w| lexforge::storage::EntryRecord {
            word: w.to_string(),
            keywords: w.to_string(),
            data: "{}".to_string(),
            created_at: chrono::Utc::now(),
        });
        db.upsert_entries(&seeded).await.expect("seed");
    }

    let pipeline = Pipeline::new(test_config(db_path.clone()), Arc::new(ScriptedGenerator::default()))
        .await
        .expect("pipeline construction");
    let summary = pipeline.run(&source, word_prompt()).await.expect("run");

    assert_eq!(summary.total, 4);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.stored, 2);

    let db = Database::open(&db_path).await.expect("reopen");
    assert_eq!(db.count_entries().await.expect("count"), 4);
    // Seeded rows were not regenerated.
    let seeded = db.get_entry("one").await.expect("get").expect("present");
    assert_eq!(seeded.data, "{}");
}

#[tokio::test]
async fn one_failing_word_does_not_disturb_the_rest() {
    let dir = tempfile::tempdir().expect("temp dir");

    let generator = Arc::new(ScriptedGenerator {
        always_throttled: HashSet::from(["cursed".to_string()]),
        ..Default::default()
    });

    let words = ["fine1", "fine2", "cursed", "fine3", "fine4"];
    let (summary, db) = run_pipeline(&dir, Arc::clone(&generator), &words).await;

    assert_eq!(summary.stored, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failed_words, vec!["cursed".to_string()]);
    assert_eq!(db.count_entries().await.expect("count"), 4);
    assert!(db.get_entry("cursed").await.expect("get").is_none());

    // The cursed word consumed exactly max_attempts calls; the healthy
    // words one each.
    let max_attempts = PipelineConfig::default().max_attempts as u64;
    assert_eq!(generator.calls(), 4 + max_attempts);
}

#[tokio::test]
async fn near_valid_responses_are_repaired_and_stored() {
    let dir = tempfile::tempdir().expect("temp dir");

    let generator = Arc::new(ScriptedGenerator {
        prose_wrapped: HashSet::from(["chatty".to_string()]),
        trailing_comma: HashSet::from(["sloppy".to_string()]),
        ..Default::default()
    });

    let words = ["chatty", "sloppy", "clean"];
    let (summary, db) = run_pipeline(&dir, Arc::clone(&generator), &words).await;

    assert_eq!(summary.stored, 3);
    assert_eq!(summary.failed, 0);
    // Repair happens inline; no retries were needed.
    assert_eq!(generator.calls(), 3);

    for word in words {
        let entry = db.get_entry(word).await.expect("get").expect("present");
        let doc: serde_json::Value =
            serde_json::from_str(&entry.data).expect("stored data is valid JSON");
        assert_eq!(doc["word"], word);
    }
}

#[tokio::test]
async fn input_duplicates_collapse_to_one_row() {
    let dir = tempfile::tempdir().expect("temp dir");

    let generator = Arc::new(ScriptedGenerator::default());
    let words = ["echo", "delta", "echo", "echo"];
    let (summary, db) = run_pipeline(&dir, Arc::clone(&generator), &words).await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.stored, 2);
    assert_eq!(db.count_entries().await.expect("count"), 2);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn empty_word_list_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let source = write_word_list(&dir, &[]);

    let pipeline = Pipeline::new(
        test_config(dir.path().join("test.db")),
        Arc::new(ScriptedGenerator::default()),
    )
    .await
    .expect("pipeline construction");

    let result = pipeline.run(&source, word_prompt()).await;
    assert!(matches!(
        result,
        Err(lexforge::pipeline::PipelineError::Source(_))
    ));
}

#[tokio::test]
async fn keywords_contain_headword_and_surface_forms() {
    let dir = tempfile::tempdir().expect("temp dir");

    let (_, db) = run_pipeline(&dir, Arc::new(ScriptedGenerator::default()), &["Fjord"]).await;

    let entry = db.get_entry("Fjord").await.expect("get").expect("present");
    let keywords: Vec<&str> = entry.keywords.split(' ').collect();
    assert_eq!(keywords[0], "fjord");
    assert!(keywords.contains(&"fjords"));
}
