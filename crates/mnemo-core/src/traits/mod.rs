// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits implemented by pluggable backends.

pub mod embedding;

pub use embedding::EmbeddingBackend;
