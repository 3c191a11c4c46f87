//! Keyword recall shared by the backends.

use forgeloop_core::memory::{MemoryEntry, MemoryQuery};

/// Score, filter, and order `entries` for `query`.
///
/// Each query word found in an entry adds its occurrence count, normalized
/// by entry length; entries matching no word are dropped. An empty query
/// matches everything (newest first), subject to the tag filter.
pub fn rank<'a>(
    entries: impl IntoIterator<Item = &'a MemoryEntry>,
    query: &MemoryQuery,
) -> Vec<MemoryEntry> {
    let words: Vec<String> = query
        .text
        .split_whitespace()
        .map(str::to_lowercase)
        .collect();

    let mut results: Vec<MemoryEntry> = entries
        .into_iter()
        .filter(|e| query.tags.is_empty() || query.tags.iter().any(|t| e.tags.contains(t)))
        .filter_map(|e| {
            if words.is_empty() {
                return Some(e.clone());
            }
            let content = e.content.to_lowercase();
            let hits: usize = words
                .iter()
                .map(|w| content.matches(w.as_str()).count())
                .sum();
            let tag_hits = e
                .tags
                .iter()
                .filter(|t| words.iter().any(|w| t.to_lowercase() == *w))
                .count();
            if hits + tag_hits == 0 {
                return None;
            }
            let mut entry = e.clone();
            entry.score =
                (hits + 2 * tag_hits) as f32 / (e.content.len() as f32 / 100.0).max(1.0);
            Some(entry)
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    results.truncate(query.limit);
    results
}
