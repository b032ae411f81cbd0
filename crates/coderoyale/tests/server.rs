//! Integration tests for the CodeRoyale server: the HTTP gateway in
//! isolation, and the full WebSocket handshake/dispatch flow end to
//! end against a real bound listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_test::TestServer;
use coderoyale::judge::StubJudgeClient;
use coderoyale::snapshot_store::FsSnapshotStore;
use coderoyale::{gateway, CodeRoyaleServerBuilder, ServerState};
use coderoyale_protocol::{
    ClientCommand, ClientEnvelope, MatchPhase, PlayerId, ServerEnvelope, ServerEvent,
};
use coderoyale_session::{Authenticator, SessionConfig, SessionError};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

/// Treats the bearer token as the player id, failing anything that
/// isn't a plain integer. Good enough for a test double; production
/// auth is the embedder's problem, per [`Authenticator`]'s contract.
struct TestAuthenticator;

impl Authenticator for TestAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<PlayerId, SessionError> {
        token
            .parse()
            .map(PlayerId)
            .map_err(|_| SessionError::AuthFailed("token must be a player id".into()))
    }
}

async fn tempdir() -> FsSnapshotStore {
    static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let mut dir = std::env::temp_dir();
    dir.push(format!("coderoyale-server-test-{}-{n}", std::process::id()));
    FsSnapshotStore::new(dir).await.expect("temp snapshot dir")
}

async fn test_state() -> Arc<ServerState<TestAuthenticator, StubJudgeClient, FsSnapshotStore>> {
    Arc::new(ServerState::new(
        TestAuthenticator,
        StubJudgeClient::with_delay(Duration::from_millis(1)),
        tempdir().await,
        coderoyale::problems::seed_problems(),
        SessionConfig::default(),
    ))
}

// ---------------------------------------------------------------------
// HTTP gateway, exercised in-memory via axum-test
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_create_room_then_register_returns_lobby_state() {
    let server = TestServer::new(gateway::router(test_state().await)).unwrap();

    let created = server.post("/parties/coderoyale/rooms").json(&json!({})).await;
    created.assert_status_ok();
    let room_id = created.json::<serde_json::Value>()["roomId"].as_u64().unwrap();

    let registered = server
        .post(&format!("/parties/coderoyale/{room_id}/register"))
        .json(&json!({
            "authToken": "7",
            "username": "Alice",
            "isHost": true,
        }))
        .await;
    registered.assert_status_ok();
    let body: serde_json::Value = registered.json();
    assert_eq!(body["playerId"], 7);
    assert_eq!(body["roomId"], room_id);
    assert_eq!(body["phase"], "LOBBY");
    assert_eq!(body["playerCount"], 1);
    assert_eq!(body["playerToken"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_register_into_missing_room_is_404() {
    let server = TestServer::new(gateway::router(test_state().await)).unwrap();

    let response = server
        .post("/parties/coderoyale/999/register")
        .json(&json!({ "authToken": "1", "username": "Ghost" }))
        .await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let server = TestServer::new(gateway::router(test_state().await)).unwrap();

    let created = server.post("/parties/coderoyale/rooms").json(&json!({})).await;
    let room_id = created.json::<serde_json::Value>()["roomId"].as_u64().unwrap();

    let first = server
        .post(&format!("/parties/coderoyale/{room_id}/register"))
        .json(&json!({ "authToken": "1", "username": "Alice", "isHost": true }))
        .await;
    first.assert_status_ok();

    let second = server
        .post(&format!("/parties/coderoyale/{room_id}/register"))
        .json(&json!({ "authToken": "2", "username": "Alice" }))
        .await;
    second.assert_status_conflict();
}

#[tokio::test]
async fn test_bad_auth_token_is_unauthorized() {
    let server = TestServer::new(gateway::router(test_state().await)).unwrap();

    let created = server.post("/parties/coderoyale/rooms").json(&json!({})).await;
    let room_id = created.json::<serde_json::Value>()["roomId"].as_u64().unwrap();

    let response = server
        .post(&format!("/parties/coderoyale/{room_id}/register"))
        .json(&json!({ "authToken": "not-a-number", "username": "Eve" }))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_room_state_reflects_registrations() {
    let server = TestServer::new(gateway::router(test_state().await)).unwrap();

    let created = server.post("/parties/coderoyale/rooms").json(&json!({})).await;
    let room_id = created.json::<serde_json::Value>()["roomId"].as_u64().unwrap();
    server
        .post(&format!("/parties/coderoyale/{room_id}/register"))
        .json(&json!({ "authToken": "1", "username": "Alice", "isHost": true }))
        .await
        .assert_status_ok();

    let state = server.get(&format!("/parties/coderoyale/{room_id}/state")).await;
    state.assert_status_ok();
    let body: serde_json::Value = state.json();
    assert_eq!(body["playerCount"], 1);
    assert_eq!(body["phase"], "LOBBY");
}

// ---------------------------------------------------------------------
// Full handshake + dispatch flow against a real bound listener
// ---------------------------------------------------------------------

/// A bare-bones HTTP/1.1 client: no keep-alive handling needed since
/// every request asks the server to close the connection after
/// responding. Avoids pulling in a full HTTP client crate for what
/// amounts to two test-only POSTs.
async fn http_post(addr: SocketAddr, path: &str, body: serde_json::Value) -> (u16, serde_json::Value) {
    let payload = serde_json::to_vec(&body).unwrap();
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.write_all(&payload).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8_lossy(&raw);
    let mut parts = text.splitn(2, "\r\n\r\n");
    let head = parts.next().unwrap_or("");
    let body_text = parts.next().unwrap_or("");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0);
    let json = serde_json::from_str(body_text).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn recv_envelope(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
) -> ServerEnvelope {
    loop {
        match ws.next().await.expect("stream ended").expect("ws error") {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Binary(data) => return serde_json::from_slice(&data).unwrap(),
            _ => continue,
        }
    }
}

async fn send_command(
    ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
    command: ClientCommand,
) {
    let envelope = ClientEnvelope { request_id: None, command };
    let text = serde_json::to_string(&envelope).unwrap();
    ws.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn test_join_room_then_chat_round_trips_over_websocket() {
    let server = CodeRoyaleServerBuilder::new()
        .ws_addr("127.0.0.1:0")
        .http_addr("127.0.0.1:0")
        .build(TestAuthenticator, StubJudgeClient::with_delay(Duration::from_millis(1)), tempdir().await)
        .await
        .expect("server should bind");
    let ws_addr = server.ws_local_addr().unwrap();
    let http_addr = server.http_local_addr().unwrap();
    tokio::spawn(server.run());

    let (status, created) = http_post(http_addr, "/parties/coderoyale/rooms", json!({})).await;
    assert_eq!(status, 200);
    let room_id = created["roomId"].as_u64().unwrap();

    let (status, registered) = http_post(
        http_addr,
        &format!("/parties/coderoyale/{room_id}/register"),
        json!({ "authToken": "1", "username": "Alice", "isHost": true }),
    )
    .await;
    assert_eq!(status, 200);
    let player_token = registered["playerToken"].as_str().unwrap().to_string();

    let url = format!("ws://{ws_addr}/parties/coderoyale/{room_id}/ws");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url).await.expect("ws connect");

    send_command(&mut ws, ClientCommand::JoinRoom { token: player_token }).await;

    let snapshot_envelope = recv_envelope(&mut ws).await;
    match snapshot_envelope.event {
        ServerEvent::RoomSnapshot(snapshot) => {
            assert_eq!(snapshot.room_id.0, room_id);
            assert_eq!(snapshot.match_view.phase, MatchPhase::Lobby);
        }
        other => panic!("expected RoomSnapshot, got {other:?}"),
    }

    send_command(&mut ws, ClientCommand::SendChat { text: "gg".to_string() }).await;

    let chat_envelope = recv_envelope(&mut ws).await;
    match chat_envelope.event {
        ServerEvent::ChatAppend(message) => {
            assert_eq!(message.text, "gg");
            assert_eq!(message.player_id.0, 1);
        }
        other => panic!("expected ChatAppend, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_with_unknown_token_is_rejected() {
    let server = CodeRoyaleServerBuilder::new()
        .ws_addr("127.0.0.1:0")
        .http_addr("127.0.0.1:0")
        .build(TestAuthenticator, StubJudgeClient::with_delay(Duration::from_millis(1)), tempdir().await)
        .await
        .expect("server should bind");
    let ws_addr = server.ws_local_addr().unwrap();
    let http_addr = server.http_local_addr().unwrap();
    tokio::spawn(server.run());

    let (_, created) = http_post(http_addr, "/parties/coderoyale/rooms", json!({})).await;
    let room_id = created["roomId"].as_u64().unwrap();

    let url = format!("ws://{ws_addr}/parties/coderoyale/{room_id}/ws");
    let (mut ws, _response) = tokio_tungstenite::connect_async(url).await.expect("ws connect");

    send_command(&mut ws, ClientCommand::JoinRoom { token: "not-a-real-token".to_string() }).await;

    let envelope = recv_envelope(&mut ws).await;
    assert!(matches!(envelope.event, ServerEvent::Error(_)));
}
