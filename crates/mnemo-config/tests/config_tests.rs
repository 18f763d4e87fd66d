// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the mnemo configuration system.

use std::path::PathBuf;

use mnemo_config::load_config_from_str;

/// Valid TOML with known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[memory]
data_dir = "/tmp/mnemo-test"
model_name = "all-MiniLM-L6-v2"
default_importance = 0.7
write_interval_ms = 250
dedup_window = 50
vector_oversample = 20
recent_tail_turns = 3
cache_capacity = 64
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.memory.data_dir, PathBuf::from("/tmp/mnemo-test"));
    assert_eq!(config.memory.model_name, "all-MiniLM-L6-v2");
    assert!((config.memory.default_importance - 0.7).abs() < f64::EPSILON);
    assert_eq!(config.memory.write_interval_ms, 250);
    assert_eq!(config.memory.dedup_window, 50);
    assert_eq!(config.memory.vector_oversample, 20);
    assert_eq!(config.memory.recent_tail_turns, 3);
    assert_eq!(config.memory.cache_capacity, 64);
}

/// Empty TOML yields the compiled defaults.
#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty TOML should deserialize");
    assert_eq!(config.memory.write_interval_ms, 500);
    assert_eq!(config.memory.dedup_window, 100);
    assert_eq!(config.memory.vector_oversample, 30);
    assert_eq!(config.memory.recent_tail_turns, 5);
    assert_eq!(config.memory.purge_interval, 1000);
    assert!((config.memory.vector_weight - 0.4).abs() < f64::EPSILON);
    assert!((config.memory.keyword_weight - 0.3).abs() < f64::EPSILON);
    assert!((config.memory.recency_weight - 0.3).abs() < f64::EPSILON);
}

/// Partial sections keep defaults for unspecified fields.
#[test]
fn partial_section_keeps_other_defaults() {
    let toml = r#"
[memory]
purge_threshold = 0.25
"#;
    let config = load_config_from_str(toml).expect("partial TOML should deserialize");
    assert!((config.memory.purge_threshold - 0.25).abs() < f64::EPSILON);
    // Unspecified fields fall back to defaults.
    assert_eq!(config.memory.purge_interval, 1000);
    assert!((config.memory.decay_rate_per_day - 0.01).abs() < f64::EPSILON);
}

/// Unknown fields are rejected rather than silently ignored.
#[test]
fn unknown_field_is_rejected() {
    let toml = r#"
[memory]
dedupe_window = 50
"#;
    let result = load_config_from_str(toml);
    assert!(result.is_err(), "unknown key should fail extraction");
}

/// Unknown top-level sections are rejected.
#[test]
fn unknown_section_is_rejected() {
    let toml = r#"
[memroy]
dedup_window = 50
"#;
    let result = load_config_from_str(toml);
    assert!(result.is_err(), "unknown section should fail extraction");
}
