//! Per-connection send queue and close signalling.
//!
//! Sends never block and never wait on a peer: each connection owns a
//! bounded queue drained by its writer task, and a send to a full queue is
//! counted as a drop rather than applying backpressure to the broadcaster.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

use matinee_core::{ConnectionId, ServerEvent};

/// Outbound queue depth per connection.
///
/// Full queue means the client is not draining its socket; further sends
/// are dropped and counted against the connection's drop budget.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Handle to one live socket, shared between the session loops, the
/// connection directory, and the broadcaster.
pub struct ConnectionHandle {
    /// Connection identifier, assigned at upgrade.
    pub id: ConnectionId,
    tx: mpsc::Sender<Arc<String>>,
    cancel: CancellationToken,
    dropped: AtomicU64,
}

impl ConnectionHandle {
    /// Wrap the sending half of a connection's outbound queue.
    #[must_use]
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            tx,
            cancel: CancellationToken::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a pre-serialized message without blocking.
    ///
    /// Returns `false` (and counts a drop) when the queue is full or the
    /// writer has gone away.
    pub fn send(&self, message: Arc<String>) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(_) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Serialize and queue a server event.
    pub fn send_event(&self, event: &ServerEvent) -> bool {
        match serde_json::to_string(event) {
            Ok(text) => self.send(Arc::new(text)),
            Err(err) => {
                warn!(conn_id = %self.id, error = %err, "failed to serialize event");
                false
            }
        }
    }

    /// Messages dropped on this connection so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signal both session loops to shut the socket down.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once the connection has been closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
