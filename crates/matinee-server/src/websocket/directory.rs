//! Registry of authenticated connections.
//!
//! A connection enters the directory only after its `authenticate` frame is
//! accepted, so every entry carries the visitor and screening it was bound
//! to. Removal returns the binding, and each binding is returned exactly
//! once; disconnect cleanup keys off that to release seats and announce the
//! departure a single time even when the reaper and the session loop race.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use metrics::gauge;
use tokio::sync::RwLock;
use tracing::{debug, info};

use matinee_core::{ConnectionId, ScreeningId, VisitorId};

use crate::metrics::WS_CONNECTIONS_ACTIVE;
use crate::websocket::connection::ConnectionHandle;

/// An authenticated connection and the identity it was bound to.
#[derive(Clone)]
pub struct Binding {
    /// The live connection.
    pub conn: Arc<ConnectionHandle>,
    /// Visitor authenticated on this connection.
    pub visitor_id: VisitorId,
    /// The visitor's screening at bind time.
    pub screening_id: ScreeningId,
}

/// Lookup table from connection id to authenticated binding.
#[derive(Default)]
pub struct ConnectionDirectory {
    bindings: RwLock<HashMap<ConnectionId, Binding>>,
    active: AtomicUsize,
}

impl ConnectionDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a visitor after successful authentication.
    ///
    /// Re-authenticating on the same socket replaces the existing binding.
    pub async fn bind(
        &self,
        conn: Arc<ConnectionHandle>,
        visitor_id: VisitorId,
        screening_id: ScreeningId,
    ) {
        let conn_id = conn.id.clone();
        let binding = Binding {
            conn,
            visitor_id: visitor_id.clone(),
            screening_id: screening_id.clone(),
        };
        let previous = self.bindings.write().await.insert(conn_id.clone(), binding);
        if previous.is_none() {
            let _ = self.active.fetch_add(1, Ordering::Relaxed);
        }
        gauge!(WS_CONNECTIONS_ACTIVE).set(self.connection_count() as f64);
        info!(
            conn_id = %conn_id,
            visitor_id = %visitor_id,
            screening_id = %screening_id,
            total = self.connection_count(),
            "connection bound"
        );
    }

    /// Remove and return the binding for a connection, if any.
    pub async fn unbind(&self, conn_id: &ConnectionId) -> Option<Binding> {
        let removed = self.bindings.write().await.remove(conn_id);
        if removed.is_some() {
            let _ = self.active.fetch_sub(1, Ordering::Relaxed);
            gauge!(WS_CONNECTIONS_ACTIVE).set(self.connection_count() as f64);
            debug!(conn_id = %conn_id, total = self.connection_count(), "connection unbound");
        }
        removed
    }

    /// Remove and return every binding for a visitor.
    pub async fn unbind_visitor(&self, visitor_id: &VisitorId) -> Vec<Binding> {
        let mut bindings = self.bindings.write().await;
        let conn_ids: Vec<ConnectionId> = bindings
            .iter()
            .filter(|(_, b)| b.visitor_id == *visitor_id)
            .map(|(id, _)| id.clone())
            .collect();

        let mut removed = Vec::with_capacity(conn_ids.len());
        for conn_id in conn_ids {
            if let Some(binding) = bindings.remove(&conn_id) {
                let _ = self.active.fetch_sub(1, Ordering::Relaxed);
                removed.push(binding);
            }
        }
        drop(bindings);

        if !removed.is_empty() {
            gauge!(WS_CONNECTIONS_ACTIVE).set(self.connection_count() as f64);
            debug!(
                visitor_id = %visitor_id,
                connections = removed.len(),
                "visitor connections unbound"
            );
        }
        removed
    }

    /// Find a live connection for a visitor, searching all screenings.
    pub async fn find_visitor(&self, visitor_id: &VisitorId) -> Option<Arc<ConnectionHandle>> {
        self.bindings
            .read()
            .await
            .values()
            .find(|b| b.visitor_id == *visitor_id)
            .map(|b| Arc::clone(&b.conn))
    }

    /// Snapshot the connections bound to a screening.
    pub async fn snapshot_screening(
        &self,
        screening_id: &ScreeningId,
    ) -> Vec<Arc<ConnectionHandle>> {
        self.bindings
            .read()
            .await
            .values()
            .filter(|b| b.screening_id == *screening_id)
            .map(|b| Arc::clone(&b.conn))
            .collect()
    }

    /// Number of authenticated connections.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
