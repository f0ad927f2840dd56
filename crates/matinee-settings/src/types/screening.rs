//! Screening seed and presence sweep settings.

use serde::{Deserialize, Serialize};

/// The screening seeded at startup so clients can join without any
/// provisioning step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScreeningSettings {
    /// Identifier of the seeded screening.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Content magnet link handed to clients.
    pub magnet_link: String,
    /// How long after startup the screening runs, in hours.
    pub duration_hours: u64,
    /// Seating chart rows.
    pub rows: u32,
    /// Seats in each row.
    pub seats_per_row: u32,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            title: "Big Buck Bunny".to_string(),
            magnet_link: "magnet:?xt=urn:btih:dd8255ecdc7ca55fb0bbf81323d87062db1f6d1c&dn=Big+Buck+Bunny&tr=udp%3A%2F%2Fexplodie.org%3A6969&tr=udp%3A%2F%2Ftracker.coppersurfer.tk%3A6969&tr=udp%3A%2F%2Ftracker.empire-js.us%3A1337&tr=udp%3A%2F%2Ftracker.leechers-paradise.org%3A6969&tr=udp%3A%2F%2Ftracker.opentrackr.org%3A1337&tr=wss%3A%2F%2Ftracker.btorrent.xyz&tr=wss%3A%2F%2Ftracker.fastcast.nz&tr=wss%3A%2F%2Ftracker.openwebtorrent.com&ws=https%3A%2F%2Fwebtorrent.io%2Ftorrents%2F&xs=https%3A%2F%2Fwebtorrent.io%2Ftorrents%2Fbig-buck-bunny.torrent".to_string(),
            duration_hours: 24,
            rows: 5,
            seats_per_row: 10,
        }
    }
}

/// Inactivity sweep settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresenceSettings {
    /// Seconds between reaper sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds of silence before a visitor is considered stale.
    ///
    /// Zero means every visitor is stale on the next sweep; useful in
    /// tests, never in production.
    pub inactivity_timeout_secs: u64,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
            inactivity_timeout_secs: 300,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
