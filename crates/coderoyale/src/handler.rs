//! Per-connection handler: room resolution, the `JOIN_ROOM` handshake,
//! and the duplex message loop.
//!
//! Each accepted WebSocket connection gets its own pair of Tokio
//! tasks: this function runs the reader (decode inbound envelopes,
//! dispatch to the room) while a sibling task drains the outbound
//! queue the room writes `ServerEnvelope`s onto.

use std::sync::Arc;
use std::time::Duration;

use coderoyale_protocol::{
    ClientCommand, ClientEnvelope, Codec, ErrorCode, ErrorPayload, JsonCodec, PlayerId, RoomId,
    ServerEnvelope, ServerEvent,
};
use coderoyale_room::{JudgeClient, PlayerSender, RoomError, SnapshotStore};
use coderoyale_session::Authenticator;
use coderoyale_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::CodeRoyaleError;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Drop guard that tears down a player's session and room membership
/// when the handler exits, however it exits. `Drop` is synchronous, so
/// cleanup is pushed onto a detached task.
struct ConnectionGuard<A: Authenticator, J: JudgeClient, S: SnapshotStore> {
    player_id: PlayerId,
    state: Arc<ServerState<A, J, S>>,
}

impl<A: Authenticator, J: JudgeClient, S: SnapshotStore> Drop for ConnectionGuard<A, J, S> {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.sessions.lock().await.disconnect(player_id).ok();
            if let Err(e) = state.rooms.lock().await.disconnect(player_id).await {
                tracing::debug!(%player_id, error = %e, "room disconnect failed");
            }
        });
    }
}

/// Parses the `roomId` out of a handshake path shaped like
/// `/parties/coderoyale/{roomId}/ws`.
fn room_id_from_path(path: &str) -> Option<RoomId> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some("parties"), Some("coderoyale"), Some(id), Some("ws")) => {
            id.parse().ok().map(RoomId)
        }
        _ => None,
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, J, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, J, S>>,
) -> Result<(), CodeRoyaleError>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let conn_id = conn.id();
    let codec = JsonCodec;

    let room_id = room_id_from_path(conn.path()).ok_or_else(|| {
        coderoyale_protocol::ProtocolError::InvalidMessage(format!(
            "unroutable path {:?}",
            conn.path()
        ))
    })?;

    tracing::debug!(%conn_id, %room_id, "handling new connection");

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEnvelope>();
    let player_id = perform_handshake(&conn, &codec, &state, room_id, tx).await?;

    tracing::info!(%conn_id, %room_id, %player_id, "player connected");

    state
        .sessions
        .lock()
        .await
        .create(player_id)
        .map_err(CodeRoyaleError::Session)?;
    let _guard = ConnectionGuard { player_id, state: Arc::clone(&state) };

    let conn = Arc::new(conn);
    let writer_conn = Arc::clone(&conn);
    let writer_codec = codec;
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match writer_codec.encode(&event) {
                Ok(bytes) => {
                    if writer_conn.send(&bytes).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::debug!(error = %e, "failed to encode outbound event"),
            }
        }
    });

    loop {
        let data = match tokio::time::timeout(IDLE_TIMEOUT, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%player_id, "connection idle timeout");
                break;
            }
        };

        let envelope: ClientEnvelope = match codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode envelope");
                continue;
            }
        };

        if let Err(e) = state
            .rooms
            .lock()
            .await
            .dispatch(player_id, envelope.request_id, envelope.command)
            .await
        {
            tracing::debug!(%player_id, error = %e, "room dispatch failed, room gone");
            break;
        }
    }

    writer.abort();
    let _ = conn.close().await;

    Ok(())
}

/// Waits for the first message, requires it to be `JOIN_ROOM`, and
/// resolves it against `room_id` via [`coderoyale_room::RoomManager::connect`].
async fn perform_handshake<A, J, S>(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    state: &Arc<ServerState<A, J, S>>,
    room_id: RoomId,
    sender: PlayerSender,
) -> Result<PlayerId, CodeRoyaleError>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(CodeRoyaleError::Room(RoomError::BadRequest(
                "connection closed before JOIN_ROOM".into(),
            )));
        }
        Ok(Err(e)) => return Err(CodeRoyaleError::Transport(e)),
        Err(_) => {
            return Err(CodeRoyaleError::Room(RoomError::BadRequest(
                "handshake timed out".into(),
            )));
        }
    };

    let envelope: ClientEnvelope = codec.decode(&data)?;
    let ClientCommand::JoinRoom { token } = envelope.command else {
        send_handshake_error(conn, codec, envelope.request_id, "first message must be JOIN_ROOM")
            .await;
        return Err(CodeRoyaleError::Room(RoomError::BadRequest(
            "first message must be JOIN_ROOM".into(),
        )));
    };

    match state.rooms.lock().await.connect(room_id, token, sender).await {
        Ok(player_id) => Ok(player_id),
        Err(e) => {
            send_handshake_error(conn, codec, envelope.request_id, &e.to_string()).await;
            Err(CodeRoyaleError::Room(e))
        }
    }
}

async fn send_handshake_error(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    request_id: Option<String>,
    message: &str,
) {
    let envelope = ServerEnvelope {
        request_id,
        event: ServerEvent::Error(ErrorPayload {
            code: ErrorCode::BadRequest,
            message: message.to_string(),
            retry_after_ms: None,
        }),
    };
    if let Ok(bytes) = codec.encode(&envelope) {
        let _ = conn.send(&bytes).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_from_path_parses_valid_path() {
        assert_eq!(room_id_from_path("/parties/coderoyale/42/ws"), Some(RoomId(42)));
    }

    #[test]
    fn test_room_id_from_path_rejects_wrong_shape() {
        assert_eq!(room_id_from_path("/parties/coderoyale/42"), None);
        assert_eq!(room_id_from_path("/parties/other/42/ws"), None);
        assert_eq!(room_id_from_path("/parties/coderoyale/abc/ws"), None);
    }
}
