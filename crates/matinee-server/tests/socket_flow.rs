//! End-to-end WebSocket tests: handshake, fan-out, relay, and eviction.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use matinee_server::{PresenceServer, ServerHandle};
use matinee_settings::{MatineeSettings, PresenceSettings, ScreeningSettings};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const EVENT_DEADLINE: Duration = Duration::from_secs(2);

async fn start_server(settings: MatineeSettings) -> (ServerHandle, String) {
    let handle = PresenceServer::new(settings)
        .start("127.0.0.1", 0)
        .await
        .expect("server should bind");
    let base = format!("http://127.0.0.1:{}", handle.port());
    (handle, base)
}

async fn register(client: &reqwest::Client, base: &str, name: &str, screening: &str) -> (String, String) {
    let body: Value = client
        .post(format!("{base}/api/auth/visitor"))
        .json(&json!({"screening_id": screening, "visitor_name": name}))
        .send()
        .await
        .expect("register request")
        .json()
        .await
        .expect("register body");
    (
        body["token"].as_str().expect("token").to_owned(),
        body["visitor_id"].as_str().expect("visitor_id").to_owned(),
    )
}

async fn connect(base: &str, screening: &str) -> WsStream {
    let url = format!(
        "ws{}/ws/screenings/{screening}",
        base.strip_prefix("http").expect("http base url")
    );
    let (ws, _) = connect_async(url).await.expect("websocket connect");
    ws
}

async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("websocket send");
}

/// Next text frame as JSON, failing the test if none arrives in time.
async fn next_text(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(EVENT_DEADLINE, ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket ended while waiting for event")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("event should be JSON");
        }
    }
}

/// Skip events until one of the wanted type arrives.
async fn next_event_of(ws: &mut WsStream, kind: &str) -> Value {
    loop {
        let event = next_text(ws).await;
        if event["type"] == kind {
            return event;
        }
    }
}

async fn authenticate(ws: &mut WsStream, token: &str) {
    send_json(ws, json!({"type": "authenticate", "data": {"token": token}})).await;
    let event = next_event_of(ws, "authenticated").await;
    assert_eq!(event["data"]["success"], true);
}

// --- Handshake ---

#[tokio::test]
async fn authenticate_handshake_succeeds_after_a_failure() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "default").await;

    // A bad token is reported but does not end the session.
    send_json(
        &mut ws,
        json!({"type": "authenticate", "data": {"token": "garbage"}}),
    )
    .await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Invalid token");

    authenticate(&mut ws, &token).await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_get_errors() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let mut ws = connect(&base, "default").await;

    ws.send(Message::text("this is not json")).await.unwrap();
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Invalid message format");

    send_json(&mut ws, json!({"type": "mystery"})).await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Unknown message type: mystery");
}

#[tokio::test]
async fn signal_requires_authentication() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let mut ws = connect(&base, "default").await;

    send_json(
        &mut ws,
        json!({"type": "webrtc_signal", "data": {"target": "anyone"}}),
    )
    .await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Not authenticated");
}

#[tokio::test]
async fn token_for_another_screening_is_rejected() {
    // Seed a real non-default screening so the socket is not a fallback.
    let settings = MatineeSettings {
        screening: ScreeningSettings {
            id: "premiere".into(),
            ..ScreeningSettings::default()
        },
        ..MatineeSettings::default()
    };
    let (_handle, base) = start_server(settings).await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "premiere").await;
    send_json(&mut ws, json!({"type": "authenticate", "data": {"token": token}})).await;

    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["data"]["message"], "Token not valid for this screening");
}

// --- Fan-out ---

#[tokio::test]
async fn seat_update_reaches_every_screening_member() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();

    let (token_a, visitor_a) = register(&client, &base, "alice", "default").await;
    let (token_b, _) = register(&client, &base, "bob", "default").await;

    let mut ws_a = connect(&base, "default").await;
    authenticate(&mut ws_a, &token_a).await;
    let mut ws_b = connect(&base, "default").await;
    authenticate(&mut ws_b, &token_b).await;

    let response = client
        .post(format!("{base}/api/screenings/default/seats"))
        .bearer_auth(&token_a)
        .json(&json!({"row_number": 2, "seat_number": 4}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    for ws in [&mut ws_a, &mut ws_b] {
        let event = next_event_of(ws, "seat_update").await;
        let occupied = event["data"]["occupied"].as_array().unwrap();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0]["row"], 2);
        assert_eq!(occupied[0]["seat"], 4);
        assert_eq!(occupied[0]["visitor_id"], visitor_a.as_str());
    }
}

#[tokio::test]
async fn registration_is_announced_to_connected_members() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();

    let (token_a, _) = register(&client, &base, "alice", "default").await;
    let mut ws_a = connect(&base, "default").await;
    authenticate(&mut ws_a, &token_a).await;

    let (_, visitor_b) = register(&client, &base, "bob", "default").await;

    let event = next_event_of(&mut ws_a, "visitor_joined").await;
    assert_eq!(event["data"]["visitor"]["id"], visitor_b.as_str());
    assert_eq!(event["data"]["visitor"]["name"], "bob");
}

// --- Signal relay ---

#[tokio::test]
async fn signal_relay_injects_sender() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();

    let (token_a, visitor_a) = register(&client, &base, "alice", "default").await;
    let (token_b, visitor_b) = register(&client, &base, "bob", "default").await;

    let mut ws_a = connect(&base, "default").await;
    authenticate(&mut ws_a, &token_a).await;
    let mut ws_b = connect(&base, "default").await;
    authenticate(&mut ws_b, &token_b).await;

    send_json(
        &mut ws_a,
        json!({"type": "webrtc_signal", "data": {
            "target": visitor_b,
            "kind": "offer",
            "sdp": "v=0 fake-sdp"
        }}),
    )
    .await;

    let event = next_event_of(&mut ws_b, "webrtc_signal").await;
    assert_eq!(event["data"]["from"], visitor_a.as_str());
    assert_eq!(event["data"]["target"], visitor_b.as_str());
    assert_eq!(event["data"]["sdp"], "v=0 fake-sdp");
}

#[tokio::test]
async fn signal_to_absent_target_reports_error() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "default").await;
    authenticate(&mut ws, &token).await;

    send_json(
        &mut ws,
        json!({"type": "webrtc_signal", "data": {"target": "ghost"}}),
    )
    .await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert!(
        event["data"]["message"]
            .as_str()
            .unwrap()
            .contains("not found")
    );
}

#[tokio::test]
async fn signal_without_target_is_invalid() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "default").await;
    authenticate(&mut ws, &token).await;

    send_json(&mut ws, json!({"type": "webrtc_signal", "data": {"sdp": "x"}})).await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["data"]["message"], "Invalid target ID");

    send_json(&mut ws, json!({"type": "webrtc_signal", "data": "not an object"})).await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["data"]["message"], "Invalid signal data");
}

// --- Heartbeat ---

#[tokio::test]
async fn heartbeat_sends_no_acknowledgement() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();
    let (token, _) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "default").await;
    authenticate(&mut ws, &token).await;

    send_json(&mut ws, json!({"type": "heartbeat"})).await;
    let silence = timeout(Duration::from_millis(500), ws.next()).await;
    assert!(silence.is_err(), "heartbeat should not be acknowledged");

    // The session is still alive and dispatching.
    send_json(&mut ws, json!({"type": "mystery"})).await;
    let event = next_text(&mut ws).await;
    assert_eq!(event["type"], "error");
}

// --- Departure ---

#[tokio::test]
async fn disconnect_frees_seat_and_announces_departure() {
    let (_handle, base) = start_server(MatineeSettings::default()).await;
    let client = reqwest::Client::new();

    let (token_a, visitor_a) = register(&client, &base, "alice", "default").await;
    let (token_b, _) = register(&client, &base, "bob", "default").await;

    let mut ws_a = connect(&base, "default").await;
    authenticate(&mut ws_a, &token_a).await;
    let mut ws_b = connect(&base, "default").await;
    authenticate(&mut ws_b, &token_b).await;

    let response = client
        .post(format!("{base}/api/screenings/default/seats"))
        .bearer_auth(&token_a)
        .json(&json!({"row_number": 1, "seat_number": 1}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // Drain the occupancy update so the next events are the departure.
    let _ = next_event_of(&mut ws_b, "seat_update").await;

    ws_a.close(None).await.unwrap();

    // Seat release lands before the departure announcement.
    let event = next_text(&mut ws_b).await;
    assert_eq!(event["type"], "seat_update");
    assert!(event["data"]["occupied"].as_array().unwrap().is_empty());

    let event = next_text(&mut ws_b).await;
    assert_eq!(event["type"], "visitor_left");
    assert_eq!(event["data"]["visitor_id"], visitor_a.as_str());
}

#[tokio::test]
async fn evicted_visitor_is_announced_and_cut_off() {
    let settings = MatineeSettings {
        presence: PresenceSettings {
            sweep_interval_secs: 1,
            inactivity_timeout_secs: 0,
        },
        ..MatineeSettings::default()
    };
    let (_handle, base) = start_server(settings).await;
    let client = reqwest::Client::new();
    let (token, visitor_id) = register(&client, &base, "alice", "default").await;

    let mut ws = connect(&base, "default").await;
    authenticate(&mut ws, &token).await;

    // The departure is broadcast before the socket is closed, so the
    // evicted visitor sees their own eviction.
    let deadline = Duration::from_secs(3);
    let event = timeout(deadline, next_event_of(&mut ws, "visitor_left"))
        .await
        .expect("eviction should be announced");
    assert_eq!(event["data"]["visitor_id"], visitor_id.as_str());

    // Then the server closes the connection.
    let end = timeout(deadline, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    })
    .await;
    assert!(end.is_ok(), "server should close the evicted socket");
}
