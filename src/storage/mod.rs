//! Persistence: the SQLite dictionary store and the single-writer batching
//! stage that feeds it.

mod database;
mod writer;

pub use database::{Database, DatabaseError, EntryRecord, StoredEntry};
pub use writer::{BatchWriter, EntryResult, WriterMessage, WriterStats};
