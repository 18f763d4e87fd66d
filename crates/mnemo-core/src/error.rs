// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the mnemo memory store.

use thiserror::Error;

/// The primary error type used across all mnemo crates.
#[derive(Debug, Error)]
pub enum MnemoError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence errors (serialization, disk full, permission denied mid-save).
    #[error("persistence error: {message}")]
    Persist {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The embedding backend cannot produce a vector right now.
    ///
    /// Recoverable: callers degrade to lexical-only retrieval instead of
    /// failing the whole store.
    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Persisted state is inconsistent (digest mismatch, misaligned indexes).
    #[error("integrity violation: {0}")]
    Integrity(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Build a `Persist` error wrapping an underlying I/O or serde failure.
    pub fn persist(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MnemoError::Persist {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
