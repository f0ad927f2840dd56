//! Domain errors shared across the HTTP and socket surfaces.

use thiserror::Error;

use crate::ids::VisitorId;

/// Failure modes of presence operations.
///
/// Transport layers map these onto status codes and error events; the
/// variants themselves stay transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// The caller presented no credential, or one that failed verification.
    #[error("authentication required")]
    Unauthenticated,

    /// The credential was valid but its visitor no longer exists.
    #[error("visitor {visitor_id} not found")]
    UnknownVisitor {
        /// The missing visitor.
        visitor_id: VisitorId,
    },

    /// Requested seat lies outside the seating chart.
    #[error("seat ({row}, {seat}) is out of range")]
    SeatOutOfRange {
        /// Zero-based row index.
        row: u32,
        /// Zero-based seat index within the row.
        seat: u32,
    },

    /// Requested seat is held by another visitor.
    #[error("seat ({row}, {seat}) is already taken")]
    SeatOccupied {
        /// Zero-based row index.
        row: u32,
        /// Zero-based seat index within the row.
        seat: u32,
    },

    /// Signal target has no live connection.
    #[error("target visitor {target} not found")]
    TargetNotFound {
        /// The unreachable visitor.
        target: VisitorId,
    },

    /// The request was syntactically or semantically malformed.
    #[error("{reason}")]
    BadRequest {
        /// What was wrong with the request.
        reason: String,
    },
}

impl PresenceError {
    /// Bad-request error with the given reason.
    #[must_use]
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }

    /// Stable snake_case label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::UnknownVisitor { .. } => "unknown_visitor",
            Self::SeatOutOfRange { .. } => "seat_out_of_range",
            Self::SeatOccupied { .. } => "seat_occupied",
            Self::TargetNotFound { .. } => "target_not_found",
            Self::BadRequest { .. } => "bad_request",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
