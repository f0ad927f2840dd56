//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format. Each type implements [`Default`] with production default values.
//! Types marked with `#[serde(default)]` allow partial JSON — missing fields
//! get their default value during deserialization.

mod screening;
mod server;

pub use screening::*;
pub use server::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the matinee server.
///
/// Loaded from `~/.matinee/settings.json` with defaults applied for missing
/// fields. Environment variables can override specific values.
///
/// # JSON Format
///
/// All field names are camelCase. Example:
///
/// ```json
/// {
///   "version": "0.1.0",
///   "server": { "port": 9090 },
///   "presence": { "inactivityTimeoutSecs": 120 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatineeSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Listener settings.
    pub server: ServerSettings,
    /// Visitor credential settings.
    pub auth: AuthSettings,
    /// Inactivity sweep settings.
    pub presence: PresenceSettings,
    /// Startup screening seed.
    pub screening: ScreeningSettings,
}

impl Default for MatineeSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "matinee".to_string(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            presence: PresenceSettings::default(),
            screening: ScreeningSettings::default(),
        }
    }
}

impl MatineeSettings {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.screening.rows == 0 {
            return Err(SettingsError::InvalidValue(
                "screening.rows must be at least 1".to_string(),
            ));
        }
        if self.screening.seats_per_row == 0 {
            return Err(SettingsError::InvalidValue(
                "screening.seatsPerRow must be at least 1".to_string(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(SettingsError::InvalidValue(
                "auth.jwtSecret must not be empty".to_string(),
            ));
        }
        if self.presence.sweep_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "presence.sweepIntervalSecs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
