//! SQLite database client for the dictionary store.
//!
//! One table, `dictionary`, keyed by headword. Writes are upserts so
//! regenerating a word overwrites its row instead of duplicating it; the
//! batch writer is the only component that calls the write path.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Opening or creating the database failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Serialization of a payload document failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One row of the dictionary table, ready to persist.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// Headword, primary key.
    pub word: String,
    /// Space-joined, case-folded search keywords.
    pub keywords: String,
    /// Serialized payload document.
    pub data: String,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

/// A stored entry read back from the table.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub word: String,
    pub keywords: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite-backed dictionary store.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if missing) the database at `path` and ensures the
    /// dictionary table exists. WAL journal mode keeps reads cheap while the
    /// writer task commits batches.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConnectionFailed` if the file cannot be opened
    /// or created; this is the one fatal startup condition for a run.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dictionary (
                word TEXT PRIMARY KEY,
                keywords TEXT,
                data JSON,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Snapshots the set of words already stored.
    ///
    /// A failed scan is treated as an empty store (with a warning) rather
    /// than aborting the run; the worst case is regenerating entries the
    /// upsert then overwrites.
    pub async fn existing_words(&self) -> HashSet<String> {
        match sqlx::query("SELECT word FROM dictionary")
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows.iter().map(|row| row.get("word")).collect(),
            Err(e) => {
                warn!(error = %e, "Failed to scan existing words, treating store as empty");
                HashSet::new()
            }
        }
    }

    /// Upserts every record in one transaction.
    ///
    /// Either all records land or none do; a failure leaves the table
    /// untouched so the caller can retry the whole batch.
    pub async fn upsert_entries(&self, records: &[EntryRecord]) -> Result<(), DatabaseError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO dictionary (word, keywords, data, created_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(word) DO UPDATE SET
                    keywords = excluded.keywords,
                    data = excluded.data,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&record.word)
            .bind(&record.keywords)
            .bind(&record.data)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Returns the number of stored entries.
    pub async fn count_entries(&self) -> Result<i64, DatabaseError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dictionary")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Fetches one stored entry by headword.
    pub async fn get_entry(&self, word: &str) -> Result<Option<StoredEntry>, DatabaseError> {
        let row = sqlx::query(
            "SELECT word, keywords, data, created_at FROM dictionary WHERE word = ?1",
        )
        .bind(word)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| StoredEntry {
            word: r.get("word"),
            keywords: r.get("keywords"),
            data: r.get("data"),
            created_at: r.get("created_at"),
        }))
    }
}
