//! # lexforge
//!
//! Concurrent dictionary-entry generation into SQLite.
//!
//! lexforge reads a newline-delimited word list, fans the words out to a
//! bounded pool of workers that call an OpenAI-compatible generation
//! endpoint, validates (and where possible repairs) the returned JSON, and
//! persists entries through a single batching writer task. Words already in
//! the store are skipped, so interrupted runs resume without duplicating
//! work.
//!
//! ## Architecture
//!
//! - [`source`]: word-list loading and input-level deduplication
//! - [`dedup`]: filtering words already present in the store
//! - [`prompts`]: system prompt and user-prompt templates
//! - [`llm`]: the `Generator` trait and the chat-completions client
//! - [`validator`]: strict parse plus bounded textual repair
//! - [`scheduler`]: the worker pool and retry backoff policy
//! - [`storage`]: the SQLite store and the single batch-writer task
//! - [`pipeline`]: configuration and end-to-end orchestration
//! - [`cli`]: command-line interface

pub mod cli;
pub mod dedup;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod scheduler;
pub mod source;
pub mod storage;
pub mod validator;
