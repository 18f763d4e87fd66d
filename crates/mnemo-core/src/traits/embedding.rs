// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding capability trait for vector generation.

use crate::error::MnemoError;

/// Backend that converts text into a fixed-dimension embedding vector.
///
/// Selected once at store construction: a store built with a backend runs
/// hybrid retrieval, a store built without one runs lexical-only retrieval.
/// Implementations are bounded local computations; a backend that proxies a
/// remote service must impose its own timeout and report it as
/// [`MnemoError::EmbeddingUnavailable`].
pub trait EmbeddingBackend: Send + Sync {
    /// Name of the underlying model. Vectors are only comparable within
    /// one model version.
    fn model_name(&self) -> &str;

    /// Dimension of every vector this backend produces.
    fn dimensions(&self) -> usize;

    /// Embed a single text. Deterministic for a given model version.
    ///
    /// Returns [`MnemoError::EmbeddingUnavailable`] on recoverable backend
    /// failure; callers fall back to lexical-only retrieval.
    fn embed(&self, text: &str) -> Result<Vec<f32>, MnemoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstEmbedder;

    impl EmbeddingBackend for ConstEmbedder {
        fn model_name(&self) -> &str {
            "const"
        }

        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, MnemoError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    #[test]
    fn trait_is_object_safe() {
        let backend: Box<dyn EmbeddingBackend> = Box::new(ConstEmbedder);
        assert_eq!(backend.dimensions(), 3);
        assert_eq!(backend.embed("anything").unwrap().len(), 3);
    }
}
