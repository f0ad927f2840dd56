//! # matinee-settings
//!
//! Layered configuration for the matinee presence server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`MatineeSettings::default()`]
//! 2. **User file** — `~/.matinee/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `MATINEE_*` overrides (highest priority)
//!
//! There is no global settings singleton: the binary loads settings once at
//! startup and hands them to the server, which owns them for its lifetime.
//!
//! ## Crate Position
//!
//! Leaf crate below `matinee-server`; depends only on serde and tracing.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
