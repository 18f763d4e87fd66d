// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types for the mnemo memory store.

use serde::{Deserialize, Serialize};

/// One raw turn in the conversation log.
///
/// The conversation log is a superset of what gets promoted into vector
/// memory; the two have independent retention policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Speaker role ("user" or "assistant"; ingestion uses a source id).
    pub role: String,
    /// Raw turn text.
    pub content: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

/// Per-item metadata, positionally aligned with the item texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMeta {
    /// RFC 3339 timestamp of when the item was written.
    pub timestamp: String,
    /// Speaker role at write time.
    pub role: String,
    /// Content hash of the normalized text, used by the dedup window.
    pub hash: String,
}

/// Retention-value metadata, one-to-one with memory items by id.
///
/// Mutated on write (init) and on read (reinforcement). The score itself is
/// never decayed destructively; decay applies only when ranking or purging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportanceRecord {
    /// Importance score in [0.1, 1.0].
    pub score: f64,
    /// Unix seconds at creation, used for age-based decay.
    pub created_at: f64,
    /// How many retrievals have returned this item.
    pub reference_count: u64,
    /// Unix seconds of the most recent retrieval.
    pub last_accessed_at: f64,
    /// Purged items are excluded from retrieval but not physically removed.
    #[serde(default)]
    pub purged: bool,
}

/// Outcome of a write-path call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Accepted and indexed; carries the new stable positional id.
    Stored(usize),
    /// Conversation log grew, but the text matched the dedup window.
    Duplicate,
    /// Silently rejected: less than the rate-limit interval since the last
    /// accepted write. Nothing was recorded.
    RateLimited,
    /// Conversation log grew, but the embedding backend was unavailable so
    /// promotion into vector memory was skipped.
    Degraded,
}

/// Overall health of the store, reported by `stats()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryHealth {
    /// Hybrid retrieval with a loaded vector index.
    Healthy,
    /// Lexical-only retrieval, or the index was recovered empty at startup.
    Degraded,
}

impl MemoryHealth {
    /// Stable string form for logs and snapshots.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryHealth::Healthy => "healthy",
            MemoryHealth::Degraded => "degraded",
        }
    }

    /// Parse from the stable string form.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "healthy" => MemoryHealth::Healthy,
            _ => MemoryHealth::Degraded,
        }
    }
}

/// Store-level statistics for callers and debug surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// All items ever indexed, including purged ones.
    pub total_memories: usize,
    /// Items currently eligible for retrieval.
    pub active_memories: usize,
    /// Items marked purged (excluded, not physically removed).
    pub purged_memories: usize,
    /// Current health.
    pub health: MemoryHealth,
    /// RFC 3339 timestamp of the last accepted write, if any.
    pub last_updated: Option<String>,
}

/// One row of the memory viewer surface: an item joined with its
/// importance record.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    /// Stable positional id.
    pub id: usize,
    /// Item text.
    pub text: String,
    /// Speaker role at write time.
    pub role: String,
    /// RFC 3339 write timestamp.
    pub timestamp: String,
    /// Current importance score.
    pub score: f64,
    /// Retrieval count.
    pub reference_count: u64,
    /// Whether the item has been purged.
    pub purged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_turn_serde_roundtrip() {
        let turn = ConversationTurn {
            role: "user".to_string(),
            content: "My favorite color is blue".to_string(),
            timestamp: "2026-03-01T00:00:00+00:00".to_string(),
        };
        let json = serde_json::to_string(&turn).unwrap();
        let back: ConversationTurn = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, "user");
        assert_eq!(back.content, turn.content);
    }

    #[test]
    fn importance_record_purged_defaults_false() {
        // Snapshots written before the purged flag existed must still load.
        let json = r#"{"score":0.5,"created_at":1.0,"reference_count":0,"last_accessed_at":1.0}"#;
        let record: ImportanceRecord = serde_json::from_str(json).unwrap();
        assert!(!record.purged);
    }

    #[test]
    fn memory_health_string_roundtrip() {
        assert_eq!(MemoryHealth::Healthy.as_str(), "healthy");
        assert_eq!(MemoryHealth::Degraded.as_str(), "degraded");
        assert_eq!(MemoryHealth::from_str_value("healthy"), MemoryHealth::Healthy);
        assert_eq!(MemoryHealth::from_str_value("degraded"), MemoryHealth::Degraded);
        assert_eq!(MemoryHealth::from_str_value("unknown"), MemoryHealth::Degraded);
    }

    #[test]
    fn write_outcome_equality() {
        assert_eq!(WriteOutcome::Stored(3), WriteOutcome::Stored(3));
        assert_ne!(WriteOutcome::Duplicate, WriteOutcome::RateLimited);
    }
}
