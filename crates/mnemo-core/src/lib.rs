// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the mnemo memory store.
//!
//! This crate provides the error type, the domain types shared across the
//! workspace, and the `EmbeddingBackend` capability trait implemented by
//! embedding backends and test doubles.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemoError;
pub use traits::EmbeddingBackend;
pub use types::{
    ConversationTurn, ImportanceRecord, MemoryEntry, MemoryHealth, MemoryMeta, StoreStats,
    WriteOutcome,
};
