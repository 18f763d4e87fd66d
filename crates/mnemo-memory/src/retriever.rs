// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid retrieval: score fusion, budget-bounded assembly, bounded cache.
//!
//! Fuses vector similarity, keyword overlap, and positional recency into a
//! single ranking, then greedily fills a character budget, skipping entries
//! that would overflow rather than truncating them. The recency tail is
//! bounded separately. All functions here are pure; the store orchestrates
//! locking and persistence around them.

use std::collections::{BTreeSet, HashMap, VecDeque};

use mnemo_core::ConversationTurn;

use crate::lexical;

/// Fusion weights for the hybrid score.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub vector: f64,
    pub keyword: f64,
    pub recency: f64,
}

/// Fuse vector, keyword, and recency signals into a descending ranking.
///
/// - vector score: `1 / (1 + distance)`, 0 when absent from vector results
/// - keyword score: matched query tokens / total query tokens (substring
///   match against the lowercased text)
/// - recency score: `id / total_items`, strictly monotone in position
///
/// Purged and out-of-range ids are excluded. Ties break toward the higher
/// id so repeated calls on unchanged state return identical orderings.
pub fn fuse<F>(
    vector_hits: &[(usize, f32)],
    lexical_ids: &BTreeSet<u32>,
    query_tokens: &BTreeSet<String>,
    texts: &[String],
    is_purged: F,
    weights: Weights,
) -> Vec<(f64, usize)>
where
    F: Fn(usize) -> bool,
{
    let total = texts.len();
    if total == 0 {
        return Vec::new();
    }

    let distances: HashMap<usize, f32> = vector_hits.iter().copied().collect();
    let mut candidates: BTreeSet<usize> = distances.keys().copied().collect();
    candidates.extend(lexical_ids.iter().map(|id| *id as usize));
    candidates.retain(|id| *id < total && !is_purged(*id));

    let mut ranked: Vec<(f64, usize)> = candidates
        .into_iter()
        .map(|id| {
            let vector_score = distances
                .get(&id)
                .map(|dist| 1.0 / (1.0 + f64::from(*dist)))
                .unwrap_or(0.0);

            let keyword_score = if query_tokens.is_empty() {
                0.0
            } else {
                let text = texts[id].to_lowercase();
                let matched = query_tokens.iter().filter(|t| text.contains(*t)).count();
                matched as f64 / query_tokens.len() as f64
            };

            let recency_score = id as f64 / total as f64;

            let fused = weights.vector * vector_score
                + weights.keyword * keyword_score
                + weights.recency * recency_score;
            (fused, id)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.cmp(&a.1))
    });
    ranked
}

/// Format one memory entry as it appears in the context block.
pub fn format_entry(text: &str, timestamp: &str) -> String {
    format!("- {text} (from {timestamp})")
}

/// Greedily accept ranked candidates under the character budget.
///
/// Accumulates formatted-entry lengths (+1 per newline); a candidate whose
/// entry would exceed the remaining budget is skipped, not truncated, and
/// iteration continues with the next. Stops at `k` accepted entries.
/// Returns the formatted entries, the characters used, and the accepted ids
/// in ranked order.
pub fn fill_budget(
    ranked: &[(f64, usize)],
    texts: &[String],
    timestamps: &[String],
    k: usize,
    max_chars: usize,
) -> (Vec<String>, usize, Vec<usize>) {
    let mut entries = Vec::new();
    let mut accepted = Vec::new();
    let mut used = 0usize;

    for (_, id) in ranked {
        let entry = format_entry(&texts[*id], &timestamps[*id]);
        let entry_len = entry.chars().count() + 1; // +1 for newline
        if used + entry_len > max_chars {
            continue;
        }
        used += entry_len;
        entries.push(entry);
        accepted.push(*id);
        if accepted.len() >= k {
            break;
        }
    }

    (entries, used, accepted)
}

/// Format the fixed recency tail: the last `turns` raw conversation turns
/// as `Role: content` lines, truncated on a char boundary to `max_chars`.
pub fn format_tail(conversation: &[ConversationTurn], turns: usize, max_chars: usize) -> String {
    let start = conversation.len().saturating_sub(turns);
    let tail = conversation[start..]
        .iter()
        .map(|turn| format!("{}: {}", role_label(&turn.role), turn.content))
        .collect::<Vec<_>>()
        .join("\n");
    if tail.chars().count() > max_chars {
        tail.chars().take(max_chars).collect()
    } else {
        tail
    }
}

/// Compose the final context string: budget header, bulleted memory block,
/// recency tail.
pub fn compose(used: usize, max_chars: usize, entries: &[String], tail: &str) -> String {
    format!(
        "Relevant Memories (Budget: {used}/{max_chars} chars):\n{}\n\nRecent Conversation:\n{tail}",
        entries.join("\n")
    )
}

/// Tokenize a query the same way indexed text is tokenized.
pub fn query_tokens(query: &str) -> BTreeSet<String> {
    lexical::tokenize(query)
}

fn role_label(role: &str) -> String {
    let mut chars = role.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Key of one cached retrieval: `(query, k, max_chars)`.
pub type CacheKey = (String, usize, usize);

/// One cached retrieval result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The composed context string.
    pub output: String,
    /// Ids returned in the memory block, for reinforcement on cache hits.
    pub accepted: Vec<usize>,
    /// Store generation the entry was computed against.
    pub generation: u64,
}

/// Bounded FIFO cache for retrieval results, owned by the store and
/// invalidated unconditionally by every write.
#[derive(Debug, Default)]
pub struct ContextCache {
    entries: HashMap<CacheKey, CacheEntry>,
    order: VecDeque<CacheKey>,
    capacity: usize,
}

impl ContextCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Look up a cached result.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).cloned()
    }

    /// Insert a result, evicting the oldest entry past capacity.
    pub fn insert(&mut self, key: CacheKey, entry: CacheEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Drop every entry. Called on every write.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
