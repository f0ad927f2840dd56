//! HTTP error responses.
//!
//! Every handler failure funnels into [`ApiError`] so the REST surface
//! reports errors uniformly as `{"error": "..."}` JSON with a status code
//! derived from the domain error, never as plain-text bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use matinee_core::PresenceError;

use crate::auth::CredentialError;

/// Failure of a REST handler, carrying enough to build the response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Domain-level rejection from the presence registry.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// Malformed or unreadable request body.
    #[error("{0}")]
    BadRequest(String),

    /// Server-side fault the caller cannot fix.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Response status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Presence(err) => match err {
                PresenceError::Unauthenticated | PresenceError::UnknownVisitor { .. } => {
                    StatusCode::UNAUTHORIZED
                }
                PresenceError::SeatOutOfRange { .. } | PresenceError::BadRequest { .. } => {
                    StatusCode::BAD_REQUEST
                }
                PresenceError::SeatOccupied { .. } => StatusCode::CONFLICT,
                PresenceError::TargetNotFound { .. } => StatusCode::NOT_FOUND,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            // Signing failure is a server misconfiguration, not a client fault.
            CredentialError::Sign(_) => Self::Internal("could not generate token".into()),
            CredentialError::Expired | CredentialError::Invalid => {
                Self::Presence(PresenceError::Unauthenticated)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use matinee_core::{SeatPosition, VisitorId};

    #[test]
    fn status_codes_follow_error_taxonomy() {
        let unauth = ApiError::from(PresenceError::Unauthenticated);
        assert_eq!(unauth.status(), StatusCode::UNAUTHORIZED);

        let unknown = ApiError::from(PresenceError::UnknownVisitor {
            visitor_id: VisitorId::from("v-1"),
        });
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

        let range = ApiError::from(PresenceError::SeatOutOfRange { row: 9, seat: 9 });
        assert_eq!(range.status(), StatusCode::BAD_REQUEST);

        let taken = ApiError::from(PresenceError::SeatOccupied { row: 1, seat: 1 });
        assert_eq!(taken.status(), StatusCode::CONFLICT);

        let missing = ApiError::from(PresenceError::TargetNotFound {
            target: VisitorId::from("v-2"),
        });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad = ApiError::BadRequest("nope".into());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn sign_failure_maps_to_internal() {
        let key = jsonwebtoken::EncodingKey::from_secret(b"k");
        // Provoke a real signing error via an incompatible algorithm.
        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256);
        let err = jsonwebtoken::encode(&header, &serde_json::json!({}), &key).unwrap_err();

        let api = ApiError::from(CredentialError::Sign(err));
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.to_string(), "could not generate token");
    }

    #[test]
    fn display_carries_domain_message() {
        let err = ApiError::from(PresenceError::SeatOccupied { row: 2, seat: 3 });
        assert_eq!(err.to_string(), "seat (2, 3) is already taken");
    }

    #[test]
    fn seat_position_display_matches_error_text() {
        // Error messages embed positions in the same "(row, seat)" form
        // the seating types use.
        let pos = SeatPosition::new(2, 3);
        assert_eq!(format!("{pos}"), "(2, 3)");
    }
}
