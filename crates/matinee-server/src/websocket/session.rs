//! WebSocket upgrade and the per-connection session loops.
//!
//! Each socket runs a reader loop (this task) and a writer task draining
//! the connection's outbound queue. A connection starts unauthenticated and
//! may only relay or heartbeat after a successful `authenticate` frame.
//! Whatever ends the session, cleanup runs once: the directory binding is
//! removed, the visitor's seat is released, and the departure is announced
//! to the screening.

use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use matinee_core::{
    AuthenticatePayload, ClientEnvelope, ConnectionId, DEFAULT_SCREENING_ID, ScreeningId,
    ServerEvent, VisitorId,
};

use crate::AppState;
use crate::metrics::{WEBRTC_SIGNALS_RELAYED_TOTAL, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL};
use crate::websocket::connection::{ConnectionHandle, OUTBOUND_QUEUE_DEPTH};

/// Upgrade `GET /ws/screenings/{id}` to a presence socket.
///
/// The screening id is resolved before the upgrade, so a socket opened
/// against an unknown screening joins the default one.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(screening_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let resolved = state
        .registry
        .resolve_screening_id(&ScreeningId::from(screening_id));
    ws.on_upgrade(move |socket| run_session(socket, resolved, state))
}

/// Drive one socket from upgrade to cleanup.
async fn run_session(socket: WebSocket, screening_id: ScreeningId, state: AppState) {
    let conn_id = ConnectionId::new();
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(OUTBOUND_QUEUE_DEPTH);
    let conn = Arc::new(ConnectionHandle::new(conn_id.clone(), tx));

    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(conn_id = %conn_id, screening_id = %screening_id, "socket connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_conn = Arc::clone(&conn);
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(text) => {
                        let frame = Message::Text(Utf8Bytes::from(text.as_str()));
                        if ws_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                () = writer_conn.closed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader loop; `authed` is the connection's authentication state.
    let mut authed: Option<VisitorId> = None;
    loop {
        tokio::select! {
            maybe = ws_rx.next() => match maybe {
                Some(Ok(Message::Text(text))) => {
                    handle_frame(&state, &conn, &screening_id, &mut authed, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // binary, ping, pong: nothing to do
                Some(Err(err)) => {
                    debug!(conn_id = %conn_id, error = %err, "socket read failed");
                    break;
                }
            },
            () = conn.closed() => break,
        }
    }

    conn.close();
    let _ = writer.await;

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    if let Some(binding) = state.directory.unbind(&conn_id).await {
        // Free the seat first so the occupancy update lands before the
        // departure announcement, then tell the screening who left.
        match state.registry.release_seat(&binding.visitor_id) {
            Ok(Some(released)) => {
                state
                    .broadcast
                    .broadcast_to_screening(
                        &released.screening_id,
                        &ServerEvent::seat_update(released.chart),
                    )
                    .await;
            }
            Ok(None) => {}
            // Already evicted; the reaper handled the seat.
            Err(err) => debug!(conn_id = %conn_id, error = %err, "no seat to release"),
        }
        state
            .broadcast
            .broadcast_to_screening(
                &binding.screening_id,
                &ServerEvent::visitor_left(binding.visitor_id.clone()),
            )
            .await;
        info!(conn_id = %conn_id, visitor_id = %binding.visitor_id, "socket disconnected");
    } else {
        debug!(conn_id = %conn_id, "socket closed before authentication");
    }
}

/// Parse and dispatch one client frame.
async fn handle_frame(
    state: &AppState,
    conn: &Arc<ConnectionHandle>,
    socket_screening: &ScreeningId,
    authed: &mut Option<VisitorId>,
    text: &str,
) {
    let envelope = match ClientEnvelope::parse(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!(conn_id = %conn.id, error = %err, "malformed frame");
            let _ = conn.send_event(&ServerEvent::error("Invalid message format"));
            return;
        }
    };

    match envelope.message_type.as_str() {
        "authenticate" => {
            handle_authenticate(state, conn, socket_screening, authed, envelope.data).await;
        }
        "webrtc_signal" => handle_signal(state, conn, authed.as_ref(), envelope.data).await,
        "heartbeat" => handle_heartbeat(state, conn, authed.as_ref()),
        other => {
            debug!(conn_id = %conn.id, message_type = other, "unknown message type");
            let _ = conn.send_event(&ServerEvent::error(format!("Unknown message type: {other}")));
        }
    }
}

/// Verify the presented token and bind the connection to its visitor.
async fn handle_authenticate(
    state: &AppState,
    conn: &Arc<ConnectionHandle>,
    socket_screening: &ScreeningId,
    authed: &mut Option<VisitorId>,
    data: Value,
) {
    if !data.is_object() {
        let _ = conn.send_event(&ServerEvent::error("Invalid authentication data"));
        return;
    }
    let Ok(payload) = serde_json::from_value::<AuthenticatePayload>(data) else {
        let _ = conn.send_event(&ServerEvent::error("Invalid token"));
        return;
    };

    let claims = match state.credentials.verify(&payload.token) {
        Ok(claims) => claims,
        Err(err) => {
            debug!(conn_id = %conn.id, error = %err, "socket token rejected");
            let _ = conn.send_event(&ServerEvent::error("Invalid token"));
            return;
        }
    };

    // A token scoped to another screening is only accepted on the default
    // socket, which admits visitors from anywhere.
    if claims.screening_id != *socket_screening
        && socket_screening.as_str() != DEFAULT_SCREENING_ID
    {
        let _ = conn.send_event(&ServerEvent::error("Token not valid for this screening"));
        return;
    }

    let visitor = match state.registry.touch(&claims.sub) {
        Ok(visitor) => visitor,
        Err(err) => {
            // Evicted or never registered; the signature alone is not enough.
            let _ = conn.send_event(&ServerEvent::error(err.to_string()));
            return;
        }
    };

    *authed = Some(visitor.id.clone());
    state
        .directory
        .bind(Arc::clone(conn), visitor.id.clone(), visitor.screening_id)
        .await;
    info!(conn_id = %conn.id, visitor_id = %visitor.id, "connection authenticated");
    let _ = conn.send_event(&ServerEvent::authenticated());
}

/// Relay a peer-negotiation payload to its target visitor.
async fn handle_signal(
    state: &AppState,
    conn: &Arc<ConnectionHandle>,
    authed: Option<&VisitorId>,
    data: Value,
) {
    let Some(sender_id) = authed else {
        let _ = conn.send_event(&ServerEvent::error("Not authenticated"));
        return;
    };
    let Value::Object(mut payload) = data else {
        let _ = conn.send_event(&ServerEvent::error("Invalid signal data"));
        return;
    };
    let target = match payload.get("target").and_then(Value::as_str) {
        Some(target) if !target.is_empty() => VisitorId::from(target),
        _ => {
            let _ = conn.send_event(&ServerEvent::error("Invalid target ID"));
            return;
        }
    };

    // The server vouches for the sender; clients cannot forge "from".
    let _ = payload.insert("from".to_owned(), Value::String(sender_id.to_string()));

    match state
        .broadcast
        .send_to_visitor(&target, &ServerEvent::Signal(Value::Object(payload)))
        .await
    {
        Ok(()) => {
            counter!(WEBRTC_SIGNALS_RELAYED_TOTAL).increment(1);
            debug!(conn_id = %conn.id, target = %target, "signal relayed");
        }
        Err(err) => {
            let _ = conn.send_event(&ServerEvent::error(err.to_string()));
        }
    }
}

/// Refresh the visitor's activity clock. No acknowledgement is sent.
fn handle_heartbeat(state: &AppState, conn: &Arc<ConnectionHandle>, authed: Option<&VisitorId>) {
    let Some(visitor_id) = authed else {
        let _ = conn.send_event(&ServerEvent::error("Not authenticated"));
        return;
    };
    match state.registry.touch(visitor_id) {
        Ok(_) => {}
        Err(err) => {
            let _ = conn.send_event(&ServerEvent::error(err.to_string()));
        }
    }
}
