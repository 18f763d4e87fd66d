// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding backends for tests.

use mnemo_core::{EmbeddingBackend, MnemoError};

/// Deterministic bag-of-tokens embedding.
///
/// Each lowercased alphanumeric token is hashed (FNV-1a) into one of
/// `dimensions` buckets; the bucket counts are L2-normalized. Texts sharing
/// tokens get genuinely similar vectors, so hybrid-retrieval tests exercise
/// real semantic-overlap behavior without model files.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of the given dimension.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, MnemoError> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let bucket = (fnv1a(token) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut vector {
                *value /= norm;
            }
        }
        Ok(vector)
    }
}

/// Backend that always reports itself unavailable, for degraded-mode tests.
pub struct UnavailableEmbedder;

impl EmbeddingBackend for UnavailableEmbedder {
    fn model_name(&self) -> &str {
        "unavailable"
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, MnemoError> {
        Err(MnemoError::EmbeddingUnavailable(
            "test backend is always unavailable".to_string(),
        ))
    }
}

/// 64-bit FNV-1a; stable across platforms and releases, unlike
/// `DefaultHasher`.
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
