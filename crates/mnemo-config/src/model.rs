// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the mnemo memory store.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level mnemo configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemoConfig {
    /// Memory store settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Memory store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Root directory for persisted state (snapshots, backups, digests).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Name of the embedding model. Vectors are only comparable within one
    /// model version.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Initial importance for writes that carry no caller classification.
    #[serde(default = "default_importance")]
    pub default_importance: f64,

    /// Minimum milliseconds between accepted writes. Faster writes are
    /// silently rejected.
    #[serde(default = "default_write_interval_ms")]
    pub write_interval_ms: u64,

    /// How many of the most recent indexed items the dedup hash check scans.
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,

    /// Vector candidates fetched per query (oversampled for re-ranking).
    #[serde(default = "default_vector_oversample")]
    pub vector_oversample: usize,

    /// Weight of vector similarity in the fused score.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,

    /// Weight of keyword overlap in the fused score.
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,

    /// Weight of positional recency in the fused score.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Raw conversation turns appended after the memory block.
    #[serde(default = "default_recent_tail_turns")]
    pub recent_tail_turns: usize,

    /// Character cap applied to the formatted recency tail.
    #[serde(default = "default_recent_tail_max_chars")]
    pub recent_tail_max_chars: usize,

    /// Capacity of the retrieval cache (entries, FIFO eviction).
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Importance boost applied each time a memory is returned.
    #[serde(default = "default_reinforce_boost")]
    pub reinforce_boost: f64,

    /// Per-day importance decay rate (applied when ranking/purging only).
    #[serde(default = "default_decay_rate_per_day")]
    pub decay_rate_per_day: f64,

    /// Decay never reduces effective importance below this fraction.
    #[serde(default = "default_decay_floor")]
    pub decay_floor: f64,

    /// Run a purge sweep after this many accepted writes.
    #[serde(default = "default_purge_interval")]
    pub purge_interval: usize,

    /// Never-referenced items with effective importance below this are purged.
    #[serde(default = "default_purge_threshold")]
    pub purge_threshold: f64,

    /// Purged fraction at which a sweep triggers an automatic full rebuild.
    #[serde(default = "default_rebuild_purged_fraction")]
    pub rebuild_purged_fraction: f64,

    /// Minimum item count before auto-rebuild is considered.
    #[serde(default = "default_rebuild_min_items")]
    pub rebuild_min_items: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            model_name: default_model_name(),
            default_importance: default_importance(),
            write_interval_ms: default_write_interval_ms(),
            dedup_window: default_dedup_window(),
            vector_oversample: default_vector_oversample(),
            vector_weight: default_vector_weight(),
            keyword_weight: default_keyword_weight(),
            recency_weight: default_recency_weight(),
            recent_tail_turns: default_recent_tail_turns(),
            recent_tail_max_chars: default_recent_tail_max_chars(),
            cache_capacity: default_cache_capacity(),
            reinforce_boost: default_reinforce_boost(),
            decay_rate_per_day: default_decay_rate_per_day(),
            decay_floor: default_decay_floor(),
            purge_interval: default_purge_interval(),
            purge_threshold: default_purge_threshold(),
            rebuild_purged_fraction: default_rebuild_purged_fraction(),
            rebuild_min_items: default_rebuild_min_items(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("mnemo"))
        .unwrap_or_else(|| PathBuf::from("mnemo-data"))
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_importance() -> f64 {
    0.5
}

fn default_write_interval_ms() -> u64 {
    500
}

fn default_dedup_window() -> usize {
    100
}

fn default_vector_oversample() -> usize {
    30
}

fn default_vector_weight() -> f64 {
    0.4
}

fn default_keyword_weight() -> f64 {
    0.3
}

fn default_recency_weight() -> f64 {
    0.3
}

fn default_recent_tail_turns() -> usize {
    5
}

fn default_recent_tail_max_chars() -> usize {
    1000
}

fn default_cache_capacity() -> usize {
    256
}

fn default_reinforce_boost() -> f64 {
    0.1
}

fn default_decay_rate_per_day() -> f64 {
    0.01
}

fn default_decay_floor() -> f64 {
    0.5
}

fn default_purge_interval() -> usize {
    1000
}

fn default_purge_threshold() -> f64 {
    0.15
}

fn default_rebuild_purged_fraction() -> f64 {
    0.5
}

fn default_rebuild_min_items() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MemoryConfig::default();
        assert_eq!(config.write_interval_ms, 500);
        assert_eq!(config.dedup_window, 100);
        assert_eq!(config.vector_oversample, 30);
        assert_eq!(config.recent_tail_turns, 5);
        assert_eq!(config.purge_interval, 1000);
        assert!((config.default_importance - 0.5).abs() < f64::EPSILON);
        assert!((config.purge_threshold - 0.15).abs() < f64::EPSILON);
        assert!((config.decay_floor - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn fusion_weights_sum_to_one() {
        let config = MemoryConfig::default();
        let sum = config.vector_weight + config.keyword_weight + config.recency_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
