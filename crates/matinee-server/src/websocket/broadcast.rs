//! Event fan-out to screening members and point-to-point signal relay.
//!
//! Events are serialized once and shared as `Arc<String>` across all
//! recipients. Sends are non-blocking; a client that keeps a full queue
//! accrues drops, and past [`MAX_TOTAL_DROPS`] the connection is closed so
//! the session's cleanup path retires it. The broadcaster never mutates the
//! directory directly.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use matinee_core::{PresenceError, ScreeningId, ServerEvent, VisitorId};

use crate::metrics::WS_BROADCAST_DROPS_TOTAL;
use crate::websocket::connection::ConnectionHandle;
use crate::websocket::directory::ConnectionDirectory;

/// Lifetime drop budget per connection before it is forcibly closed.
pub const MAX_TOTAL_DROPS: u64 = 100;

/// Fans events out to screening members through the connection directory.
#[derive(Clone)]
pub struct BroadcastRouter {
    directory: Arc<ConnectionDirectory>,
}

impl BroadcastRouter {
    /// Create a router over the given directory.
    #[must_use]
    pub fn new(directory: Arc<ConnectionDirectory>) -> Self {
        Self { directory }
    }

    /// Send an event to every authenticated connection in a screening.
    pub async fn broadcast_to_screening(&self, screening_id: &ScreeningId, event: &ServerEvent) {
        let Some(payload) = encode(event) else { return };

        let recipients = self.directory.snapshot_screening(screening_id).await;
        let mut delivered = 0usize;
        for conn in &recipients {
            if deliver(conn, Arc::clone(&payload)) {
                delivered += 1;
            }
        }

        debug!(
            event = event.kind(),
            screening_id = %screening_id,
            delivered,
            recipients = recipients.len(),
            "broadcast event"
        );
    }

    /// Deliver an event to a single visitor's connection, wherever it is.
    ///
    /// Fails only when the visitor has no live connection; a full queue on
    /// a reachable target is counted as a drop, not surfaced to the sender.
    pub async fn send_to_visitor(
        &self,
        target: &VisitorId,
        event: &ServerEvent,
    ) -> Result<(), PresenceError> {
        let conn = self
            .directory
            .find_visitor(target)
            .await
            .ok_or_else(|| PresenceError::TargetNotFound {
                target: target.clone(),
            })?;

        if let Some(payload) = encode(event) {
            let _ = deliver(&conn, payload);
        }
        Ok(())
    }
}

/// Serialize an event for the wire, logging on failure.
fn encode(event: &ServerEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Arc::new(text)),
        Err(err) => {
            warn!(event = event.kind(), error = %err, "failed to serialize event");
            None
        }
    }
}

/// Queue a payload on one connection, enforcing the drop budget.
fn deliver(conn: &Arc<ConnectionHandle>, payload: Arc<String>) -> bool {
    if conn.send(payload) {
        return true;
    }

    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
    let drops = conn.drop_count();
    if drops >= MAX_TOTAL_DROPS {
        warn!(
            conn_id = %conn.id,
            drops,
            "drop budget exhausted, closing slow connection"
        );
        conn.close();
    } else {
        warn!(conn_id = %conn.id, drops, "queue full, dropping event");
    }
    false
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
