// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic persistence layer for the mnemo memory store.
//!
//! Every durable write goes through one primitive: serialize to a temp file
//! in the destination directory, fsync, atomically rename over the
//! destination, then maintain a rolling backup set and a sha256 sidecar
//! digest. A crash at any point leaves the destination either in its prior
//! valid state or the new valid state, never truncated.

pub mod atomic;

pub use atomic::{
    atomic_save_bytes, atomic_save_json, load_bytes_verified, load_json, sha256_hex,
};
