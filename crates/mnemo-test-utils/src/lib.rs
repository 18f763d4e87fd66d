// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for mnemo integration tests.
//!
//! Provides deterministic embedding backends for fast, CI-runnable tests
//! without model files or external services.
//!
//! # Components
//!
//! - [`HashEmbedder`] - Deterministic bag-of-tokens hash embedding
//! - [`UnavailableEmbedder`] - Always reports the backend as unavailable

pub mod hash_embedder;

pub use hash_embedder::{HashEmbedder, UnavailableEmbedder};
