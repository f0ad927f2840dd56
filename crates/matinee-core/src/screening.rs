//! Screening and visitor registry records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ScreeningId, VisitorId};
use crate::seating::{SeatPosition, SeatingChart};

/// Well-known ID of the always-present default screening.
///
/// Requests that name an unknown screening resolve to this one instead of
/// failing, so a bare deployment works without any provisioning step.
pub const DEFAULT_SCREENING_ID: &str = "default";

/// A scheduled showing with its seating chart.
///
/// Serialized verbatim as the screening snapshot API response, so the field
/// names here are wire format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Screening {
    /// Screening identifier.
    pub id: ScreeningId,
    /// Display title.
    pub title: String,
    /// Content locator handed to clients for playback.
    pub magnet_link: String,
    /// Scheduled start.
    pub start_time: DateTime<Utc>,
    /// Scheduled end.
    pub end_time: DateTime<Utc>,
    /// Seating layout and live occupancy.
    pub seats: SeatingChart,
}

/// A registered participant of a screening.
///
/// Created at credential issuance and destroyed only by inactivity eviction;
/// a socket disconnect leaves the record in place so the visitor can
/// reconnect with the same credential.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Visitor {
    /// Visitor identifier (the credential subject).
    pub id: VisitorId,
    /// Display name.
    pub name: String,
    /// The screening this visitor belongs to (always a resolved, live ID).
    pub screening_id: ScreeningId,
    /// Currently held seat, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat: Option<SeatPosition>,
    /// Last observed activity, refreshed by heartbeats and state-changing
    /// requests. Drives inactivity eviction.
    pub last_active: DateTime<Utc>,
}

impl Visitor {
    /// Create a fresh visitor record with `last_active` set to now.
    #[must_use]
    pub fn new(name: impl Into<String>, screening_id: ScreeningId) -> Self {
        Self {
            id: VisitorId::new(),
            name: name.into(),
            screening_id,
            seat: None,
            last_active: Utc::now(),
        }
    }

    /// Refresh the activity timestamp.
    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
