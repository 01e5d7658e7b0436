pub mod categories;
pub mod cleanup;
pub mod courses;
pub mod documents;
pub mod media;
pub mod rewriter;
pub mod storage;
pub mod tenancy;

use std::collections::HashSet;

use uuid::Uuid;

/// Drops repeated ids, keeping first occurrences in order.
pub(crate) fn dedup(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
