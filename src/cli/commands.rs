//! CLI command definitions for lexforge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::llm::ChatClient;
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::prompts::PromptSpec;
use crate::storage::Database;

/// Dictionary entry generator: batch LLM generation into SQLite.
#[derive(Parser)]
#[command(name = "lexforge")]
#[command(about = "Generate dictionary entries with an LLM and store them in SQLite")]
#[command(version)]
#[command(
    long_about = "lexforge reads a newline-delimited word list, generates one JSON \
dictionary entry per word through an OpenAI-compatible endpoint, and persists the \
validated entries in a SQLite database.\n\nInterrupted runs resume safely: words \
already in the database are skipped.\n\nExample usage:\n  lexforge generate --source \
words.txt --db dictionary.db --concurrency 64"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate entries for every word in a word list.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Report how many entries the database holds.
    Stats(StatsArgs),

    /// Print one stored entry.
    Show(ShowArgs),
}

/// Arguments for `lexforge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Newline-delimited word list to process.
    #[arg(short, long)]
    pub source: PathBuf,

    /// SQLite database file (created if missing).
    #[arg(long, default_value = "dictionary.db")]
    pub db: PathBuf,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "LEXFORGE_API_BASE")]
    pub api_base: String,

    /// Bearer token for the API, when it requires one.
    #[arg(long, env = "LEXFORGE_API_KEY")]
    pub api_key: Option<String>,

    /// Model identifier to request.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of concurrent generation workers.
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Attempts per word before giving up on it.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Per-request deadline in seconds.
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Buffered results that trigger a database flush.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds of pending data that trigger a database flush.
    #[arg(long)]
    pub flush_interval_secs: Option<u64>,

    /// Sampling temperature.
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// File containing the user-prompt template ({word} placeholder).
    #[arg(long)]
    pub prompt_file: Option<PathBuf>,

    /// File containing the system prompt.
    #[arg(long)]
    pub system_prompt_file: Option<PathBuf>,
}

/// Arguments for `lexforge stats`.
#[derive(Parser, Debug)]
pub struct StatsArgs {
    /// SQLite database file to inspect.
    #[arg(long, default_value = "dictionary.db")]
    pub db: PathBuf,
}

/// Arguments for `lexforge show`.
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Headword to look up.
    pub word: String,

    /// SQLite database file to inspect.
    #[arg(long, default_value = "dictionary.db")]
    pub db: PathBuf,
}

/// Parses CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parses CLI arguments and dispatches to the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Dispatches an already-parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => handle_generate(args).await,
        Commands::Stats(args) => handle_stats(args).await,
        Commands::Show(args) => handle_show(args).await,
    }
}

async fn handle_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env().context("Failed to load configuration")?;

    config.database_path = args.db;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(secs) = args.request_timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(secs) = args.flush_interval_secs {
        config.flush_interval = Duration::from_secs(secs);
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }

    let prompt = PromptSpec::from_files(
        args.system_prompt_file.as_deref(),
        args.prompt_file.as_deref(),
    )
    .context("Failed to load prompt files")?;

    let client = ChatClient::new(args.api_base, args.api_key, config.request_timeout);

    info!(
        model = %config.model,
        concurrency = config.concurrency,
        db = %config.database_path.display(),
        "Starting generation run"
    );

    let pipeline = Pipeline::new(config, Arc::new(client)).await?;
    let summary = pipeline.run(&args.source, prompt).await?;

    println!(
        "Done: {} stored, {} failed, {} skipped (of {} words)",
        summary.stored, summary.failed, summary.skipped, summary.total
    );
    if !summary.failed_words.is_empty() {
        println!("Failed words: {}", summary.failed_words.join(", "));
    }

    Ok(())
}

async fn handle_stats(args: StatsArgs) -> anyhow::Result<()> {
    let db = Database::open(&args.db).await?;
    let count = db.count_entries().await?;
    println!("{}: {} entries", args.db.display(), count);
    Ok(())
}

async fn handle_show(args: ShowArgs) -> anyhow::Result<()> {
    let db = Database::open(&args.db).await?;

    match db.get_entry(&args.word).await? {
        Some(entry) => {
            let pretty = serde_json::from_str::<serde_json::Value>(&entry.data)
                .and_then(|doc| serde_json::to_string_pretty(&doc))
                .unwrap_or(entry.data);
            println!("{}", pretty);
            println!("keywords: {}", entry.keywords);
            println!("created_at: {}", entry.created_at);
        }
        None => println!("No entry for '{}'", args.word),
    }

    Ok(())
}
