// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inverted index for keyword lookup.
//!
//! Tokens map to postings of memory ids. The index is serialized inside the
//! same metadata snapshot as the item texts, so one atomic write advances
//! both and they cannot drift.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Tokens too common to carry signal.
const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "and", "or", "but", "in", "to", "of", "for",
    "with",
];

/// Lowercase, split on non-alphanumeric boundaries, drop stop words.
///
/// Returns a sorted set so downstream iteration is deterministic.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Token -> memory-id postings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<u32>>,
}

impl InvertedIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every token of `text` under `id`.
    ///
    /// Not idempotent: the caller must index each id exactly once.
    pub fn index(&mut self, text: &str, id: u32) {
        for token in tokenize(text) {
            self.postings.entry(token).or_default().push(id);
        }
    }

    /// Remove `id` from the postings of every token of `text`.
    ///
    /// Exists solely so the write path can roll back a failed append.
    pub fn remove(&mut self, text: &str, id: u32) {
        for token in tokenize(text) {
            if let Some(ids) = self.postings.get_mut(&token) {
                ids.retain(|posted| *posted != id);
                if ids.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    /// Union of postings for the given tokens.
    pub fn lookup<'a, I>(&self, tokens: I) -> BTreeSet<u32>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut ids = BTreeSet::new();
        for token in tokens {
            if let Some(posted) = self.postings.get(token) {
                ids.extend(posted.iter().copied());
            }
        }
        ids
    }

    /// Number of distinct tokens indexed.
    pub fn token_count(&self) -> usize {
        self.postings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_stop_words() {
        let tokens = tokenize("The quick BROWN fox, and the lazy dog!");
        assert!(tokens.contains("quick"));
        assert!(tokens.contains("brown"));
        assert!(tokens.contains("fox"));
        assert!(tokens.contains("dog"));
        assert!(!tokens.contains("the"));
        assert!(!tokens.contains("and"));
    }

    #[test]
    fn tokenize_splits_on_punctuation() {
        let tokens = tokenize("color:blue; size=large");
        assert!(tokens.contains("color"));
        assert!(tokens.contains("blue"));
        assert!(tokens.contains("size"));
        assert!(tokens.contains("large"));
    }

    #[test]
    fn lookup_unions_postings() {
        let mut index = InvertedIndex::new();
        index.index("my favorite color is blue", 0);
        index.index("the sky looks blue today", 1);
        index.index("dinner was pasta", 2);

        let tokens = tokenize("blue dinner");
        let ids = index.lookup(&tokens);
        assert_eq!(ids, BTreeSet::from([0, 1, 2]));
    }

    #[test]
    fn lookup_unknown_token_is_empty() {
        let mut index = InvertedIndex::new();
        index.index("hello world", 0);
        let tokens = tokenize("zebra");
        assert!(index.lookup(&tokens).is_empty());
    }

    #[test]
    fn remove_undoes_a_single_indexing() {
        let mut index = InvertedIndex::new();
        index.index("blue house", 0);
        index.index("blue car", 1);
        index.remove("blue house", 0);

        let tokens = tokenize("blue house");
        let ids = index.lookup(&tokens);
        assert_eq!(ids, BTreeSet::from([1]));
    }

    #[test]
    fn serializes_as_transparent_token_map() {
        let mut index = InvertedIndex::new();
        index.index("blue sky", 3);
        let json = serde_json::to_value(&index).unwrap();
        // Transparent map form: {token: [id]}
        assert_eq!(json["blue"][0], 3);
        assert_eq!(json["sky"][0], 3);
    }
}
