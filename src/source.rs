//! Word-list loading.
//!
//! The work source is a pre-computed, newline-delimited word file produced by
//! upstream cleaning scripts. It is read once at startup; lines are trimmed,
//! blanks are skipped, and duplicates are dropped preserving first occurrence
//! so that downstream exactly-once guarantees do not depend on input hygiene.

use std::collections::HashSet;
use std::path::Path;

use crate::error::SourceError;

/// One unit of input work: a headword to generate an entry for.
///
/// The generation context (prompt profile, model, temperature) is shared
/// pipeline configuration; the per-call user prompt is rendered from it at
/// request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordTask {
    /// The headword, a unique stable identifier within the run.
    pub word: String,
}

impl WordTask {
    /// Creates a new task for the given headword.
    pub fn new(word: impl Into<String>) -> Self {
        Self { word: word.into() }
    }
}

/// Loads the word list from a newline-delimited file.
///
/// # Errors
///
/// Returns `SourceError::Read` if the file cannot be read, or
/// `SourceError::Empty` if it contains no usable lines.
pub fn load_word_list(path: impl AsRef<Path>) -> Result<Vec<WordTask>, SourceError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut seen = HashSet::new();
    let tasks: Vec<WordTask> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(WordTask::new)
        .collect();

    if tasks.is_empty() {
        return Err(SourceError::Empty(path.display().to_string()));
    }

    Ok(tasks)
}
