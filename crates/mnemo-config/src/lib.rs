// SPDX-FileCopyrightText: 2026 Mnemo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the mnemo memory store.
//!
//! Layered TOML loading with environment variable overrides. Every tunable
//! of the store (fusion weights, budgets, rate limit, lifecycle thresholds)
//! is a config field with the documented default.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{MemoryConfig, MnemoConfig};
