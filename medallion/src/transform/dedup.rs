//! Stable first-occurrence deduplication.

use std::collections::HashSet;
use std::hash::Hash;

/// Keep the first row for each key, preserving input order.
///
/// Returns the surviving rows and how many were dropped.
pub fn dedup_first_by<T, K, F>(rows: Vec<T>, mut key: F) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = rows.into_iter().filter(|row| seen.insert(key(row))).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
