// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded long-term memory store for a personal assistant.
//!
//! Persists conversational and document memories without an external
//! database, serves bounded-size context blocks for an LLM prompt, and
//! manages memory lifecycle (write, dedup, importance, decay, purge).
//!
//! ## Architecture
//!
//! - **OnnxEmbedder**: local ONNX inference for 384-dim embeddings
//! - **VectorIndex**: flat append-only nearest-neighbor index
//! - **InvertedIndex**: token -> memory-id postings for keyword lookup
//! - **retriever**: hybrid score fusion, budget trimming, bounded cache
//! - **ImportanceLedger**: reinforcement, decay, purge bookkeeping
//! - **MemoryStore**: the single-writer facade tying it all together

pub mod embedder;
pub mod index;
pub mod lexical;
pub mod lifecycle;
pub mod retriever;
pub mod store;

pub use embedder::OnnxEmbedder;
pub use index::{IndexState, VectorIndex};
pub use lexical::InvertedIndex;
pub use lifecycle::ImportanceLedger;
pub use store::MemoryStore;
