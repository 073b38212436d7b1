//! Resume filter over the persisted store.
//!
//! Before the concurrent phase starts, the set of words already present in
//! the store is snapshotted once and removed from the work list. Together
//! with upsert-on-conflict writes this makes reruns idempotent: a crashed or
//! partial run is resumed simply by running again.

use std::collections::HashSet;

use crate::source::WordTask;

/// Returns the subsequence of `tasks` whose words are absent from `existing`,
/// preserving input order.
///
/// Pure and synchronous; the caller guarantees `existing` was read before any
/// writer started, so no read-during-write race exists.
pub fn filter_pending(tasks: Vec<WordTask>, existing: &HashSet<String>) -> Vec<WordTask> {
    tasks
        .into_iter()
        .filter(|task| !existing.contains(&task.word))
        .collect()
}
