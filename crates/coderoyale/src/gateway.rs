//! The HTTP side channel: room creation, player registration, and
//! room diagnostics. Request/response operations that don't belong on
//! the push-based WebSocket stream get a plain REST surface instead.
//!
//! Mounted at `/parties/coderoyale/*`, alongside `coderoyale_room`'s
//! own `parties/<name>/<roomId>/...` framing for the game connection
//! itself (`GET /parties/coderoyale/:room_id/ws`, handled by the
//! WebSocket listener, not this router).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use coderoyale_protocol::{ErrorCode, PlayerRole, RoomId, RoomSettings, SettingsPatch};
use coderoyale_room::{JudgeClient, RoomError, SnapshotStore};
use coderoyale_session::{Authenticator, SessionError};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::server::ServerState;

pub fn router<A, J, S>(state: Arc<ServerState<A, J, S>>) -> Router
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    Router::new()
        .route("/parties/coderoyale/rooms", post(create_room))
        .route("/parties/coderoyale/{room_id}/register", post(register))
        .route("/parties/coderoyale/{room_id}/state", get(room_state))
        .with_state(state)
}

/// Errors this side channel can report, mapped onto an HTTP status
/// and the same [`ErrorCode`] the WebSocket side uses.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: ErrorCode,
    message: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GatewayError::Room(e) => (room_error_status(e.code()), e.code()),
            GatewayError::Session(SessionError::AuthFailed(_)) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)
            }
            GatewayError::Session(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
        };
        let body = ErrorBody { code, message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

fn room_error_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::RoomNotFound => StatusCode::NOT_FOUND,
        ErrorCode::RoomFull
        | ErrorCode::UsernameTaken
        | ErrorCode::MatchAlreadyStarted
        | ErrorCode::MatchNotStarted
        | ErrorCode::PlayerEliminated
        | ErrorCode::InsufficientScore => StatusCode::CONFLICT,
        ErrorCode::ItemOnCooldown | ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCode::JudgeUnavailable | ErrorCode::InternalError => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// 32 hex characters of randomness, same shape as the session layer's
/// reconnect token but scoped to one room's `player_tokens` table
/// rather than the connection layer.
fn generate_player_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    #[serde(default)]
    settings: Option<RoomSettings>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomResponse {
    room_id: u64,
}

async fn create_room<A, J, S>(
    State(state): State<Arc<ServerState<A, J, S>>>,
    Json(req): Json<CreateRoomRequest>,
) -> Json<CreateRoomResponse>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let settings = req.settings.unwrap_or_default().clamped();
    let room_id = state.rooms.lock().await.create_room(settings);
    Json(CreateRoomResponse { room_id: room_id.0 })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    auth_token: String,
    username: String,
    #[serde(default)]
    role: Option<PlayerRole>,
    #[serde(default)]
    is_host: bool,
    #[serde(default)]
    settings_patch: Option<SettingsPatch>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterResponse {
    player_id: u64,
    player_token: String,
    room_id: u64,
    phase: coderoyale_protocol::MatchPhase,
    player_count: usize,
    spectator_count: usize,
}

async fn register<A, J, S>(
    State(state): State<Arc<ServerState<A, J, S>>>,
    Path(room_id): Path<u64>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, GatewayError>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let player_id = state.auth.authenticate(&req.auth_token).await?;
    let player_token = generate_player_token();

    let outcome = state
        .rooms
        .lock()
        .await
        .register_player(
            RoomId(room_id),
            player_id,
            player_token.clone(),
            req.username,
            req.role.unwrap_or(PlayerRole::Player),
            req.is_host,
            req.settings_patch,
        )
        .await?;

    Ok(Json(RegisterResponse {
        player_id: player_id.0,
        player_token,
        room_id: outcome.room_id.0,
        phase: outcome.phase,
        player_count: outcome.player_count,
        spectator_count: outcome.spectator_count,
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoomStateResponse {
    room_id: u64,
    phase: coderoyale_protocol::MatchPhase,
    player_count: usize,
    settings: RoomSettings,
}

async fn room_state<A, J, S>(
    State(state): State<Arc<ServerState<A, J, S>>>,
    Path(room_id): Path<u64>,
) -> Result<Json<RoomStateResponse>, GatewayError>
where
    A: Authenticator,
    J: JudgeClient + 'static,
    S: SnapshotStore + 'static,
{
    let diagnostics = state.rooms.lock().await.diagnostics(RoomId(room_id)).await?;
    Ok(Json(RoomStateResponse {
        room_id: diagnostics.room_id.0,
        phase: diagnostics.phase,
        player_count: diagnostics.player_count,
        settings: diagnostics.settings,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_not_found_maps_to_404() {
        let err = GatewayError::Room(RoomError::NotFound(RoomId(1)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_rate_limited_maps_to_429() {
        let err = GatewayError::Room(RoomError::RateLimited(500));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_auth_failed_maps_to_401() {
        let err = GatewayError::Session(SessionError::AuthFailed("bad token".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_generate_player_token_is_32_hex_chars() {
        let token = generate_player_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
