//! Socket wire protocol: `{"type": ..., "data": ...}` envelopes.
//!
//! Inbound frames are parsed as a raw [`ClientEnvelope`] and dispatched on
//! the type string rather than deserialized into a tagged enum, because the
//! protocol allows `data` to be absent entirely (heartbeats) and requires
//! opaque passthrough of signal payloads.
//!
//! Outbound events are the typed [`ServerEvent`] enum; serde's adjacent
//! tagging produces the `{"type", "data"}` shape on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::VisitorId;
use crate::screening::Visitor;
use crate::seating::SeatingChart;

/// A raw inbound socket frame.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientEnvelope {
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Type-specific payload; `Null` when the client omitted it.
    #[serde(default)]
    pub data: Value,
}

impl ClientEnvelope {
    /// Parse an envelope from frame text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Payload of an `authenticate` frame.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthenticatePayload {
    /// The bearer credential issued at registration.
    pub token: String,
}

/// The `{id, name}` subset of a visitor announced in `visitor_joined`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorSummary {
    /// Visitor identifier.
    pub id: VisitorId,
    /// Display name.
    pub name: String,
}

impl From<&Visitor> for VisitorSummary {
    fn from(v: &Visitor) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
        }
    }
}

/// Server-to-client socket events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    /// Handshake acknowledgement, sent only to the authenticating connection.
    #[serde(rename = "authenticated")]
    Authenticated {
        /// Always `true`; failures are reported as [`ServerEvent::Error`].
        success: bool,
    },

    /// Recoverable per-connection error report.
    #[serde(rename = "error")]
    Error {
        /// Human-readable description.
        message: String,
    },

    /// Full occupancy snapshot after any seat mutation.
    #[serde(rename = "seat_update")]
    SeatUpdate(SeatingChart),

    /// A visitor registered for the screening.
    #[serde(rename = "visitor_joined")]
    VisitorJoined {
        /// The joining visitor.
        visitor: VisitorSummary,
    },

    /// A visitor disconnected or was evicted.
    #[serde(rename = "visitor_left")]
    VisitorLeft {
        /// The departing visitor.
        visitor_id: VisitorId,
    },

    /// Relayed peer-negotiation payload with `"from"` injected by the server.
    #[serde(rename = "webrtc_signal")]
    Signal(Value),
}

impl ServerEvent {
    /// Successful handshake acknowledgement.
    #[must_use]
    pub fn authenticated() -> Self {
        Self::Authenticated { success: true }
    }

    /// Error report with the given message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Occupancy snapshot event.
    #[must_use]
    pub fn seat_update(chart: SeatingChart) -> Self {
        Self::SeatUpdate(chart)
    }

    /// Join announcement for `visitor`.
    #[must_use]
    pub fn visitor_joined(visitor: &Visitor) -> Self {
        Self::VisitorJoined {
            visitor: VisitorSummary::from(visitor),
        }
    }

    /// Departure announcement for `visitor_id`.
    #[must_use]
    pub fn visitor_left(visitor_id: VisitorId) -> Self {
        Self::VisitorLeft { visitor_id }
    }

    /// Wire name of this event, for logs and metric labels.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticated { .. } => "authenticated",
            Self::Error { .. } => "error",
            Self::SeatUpdate(_) => "seat_update",
            Self::VisitorJoined { .. } => "visitor_joined",
            Self::VisitorLeft { .. } => "visitor_left",
            Self::Signal(_) => "webrtc_signal",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
