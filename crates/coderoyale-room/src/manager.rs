//! Room manager: creates rooms and tracks which player belongs to which.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use coderoyale_protocol::{PlayerId, PlayerRole, RoomId, RoomSettings, SettingsPatch};

use crate::error::RoomError;
use crate::judge::JudgeClient;
use crate::models::PlayerSender;
use crate::persistence::SnapshotStore;
use crate::problems::ProblemLibrary;
use crate::room::{spawn_room, RegisterOutcome, RoomDiagnostics, RoomHandle};

/// Counter for generating unique room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// Default command channel size for room actors.
const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Tracks every live room and the one room each player currently
/// belongs to. Entry point for room operations from the server crate's
/// gateway and connection handlers.
pub struct RoomManager<J: JudgeClient, S: SnapshotStore> {
    rooms: HashMap<RoomId, RoomHandle>,
    /// A player belongs to at most one room at a time (key invariant).
    player_rooms: HashMap<PlayerId, RoomId>,
    problems: Arc<ProblemLibrary>,
    judge: Arc<J>,
    store: Arc<S>,
}

impl<J: JudgeClient + 'static, S: SnapshotStore + 'static> RoomManager<J, S> {
    pub fn new(problems: Arc<ProblemLibrary>, judge: Arc<J>, store: Arc<S>) -> Self {
        RoomManager { rooms: HashMap::new(), player_rooms: HashMap::new(), problems, judge, store }
    }

    /// Creates a new room with the given initial settings and returns
    /// its id.
    pub fn create_room(&mut self, settings: RoomSettings) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_room(
            room_id,
            settings,
            Arc::clone(&self.problems),
            Arc::clone(&self.judge),
            Arc::clone(&self.store),
            DEFAULT_CHANNEL_SIZE,
        );
        self.rooms.insert(room_id, handle);
        tracing::info!(%room_id, "room created");
        room_id
    }

    /// Registers a new player (or spectator) with an existing room,
    /// enforcing the one-room-per-player invariant. Returns the token
    /// the caller hands back to the client for the `Connect` handshake.
    #[allow(clippy::too_many_arguments)]
    pub async fn register_player(
        &mut self,
        room_id: RoomId,
        player_id: PlayerId,
        player_token: String,
        username: String,
        role: PlayerRole,
        is_host: bool,
        settings_patch: Option<SettingsPatch>,
    ) -> Result<RegisterOutcome, RoomError> {
        if let Some(current) = self.player_rooms.get(&player_id) {
            return Err(RoomError::BadRequest(format!("player {player_id} is already in room {current}")));
        }
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let outcome = handle
            .register(player_id, player_token, username, role, is_host, settings_patch)
            .await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(outcome)
    }

    /// Resolves a connection token to a player id against `room_id`. The
    /// caller only ever has the token at handshake time — `room_id`
    /// comes from the WebSocket path, not from any prior lookup keyed
    /// on a player id nobody has resolved yet.
    pub async fn connect(&mut self, room_id: RoomId, token: String, sender: PlayerSender) -> Result<PlayerId, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let player_id = handle.connect(token, sender).await?;
        self.player_rooms.insert(player_id, room_id);
        Ok(player_id)
    }

    pub async fn disconnect(&mut self, player_id: PlayerId) -> Result<(), RoomError> {
        let room_id = self.player_rooms.get(&player_id).copied().ok_or(RoomError::NotInRoom(player_id, RoomId(0)))?;
        if let Some(handle) = self.rooms.get(&room_id) {
            handle.disconnect(player_id).await?;
        }
        Ok(())
    }

    pub async fn dispatch(
        &self,
        player_id: PlayerId,
        request_id: Option<String>,
        command: coderoyale_protocol::ClientCommand,
    ) -> Result<(), RoomError> {
        let room_id = self.player_rooms.get(&player_id).copied().ok_or(RoomError::NotInRoom(player_id, RoomId(0)))?;
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.dispatch(player_id, request_id, command).await
    }

    pub async fn diagnostics(&self, room_id: RoomId) -> Result<RoomDiagnostics, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.diagnostics().await
    }

    /// Shuts down a room and drops every player's membership in it.
    pub async fn destroy_room(&mut self, room_id: RoomId) -> Result<(), RoomError> {
        let handle = self.rooms.remove(&room_id).ok_or(RoomError::NotFound(room_id))?;
        let _ = handle.shutdown().await;
        self.player_rooms.retain(|_, rid| *rid != room_id);
        tracing::info!(%room_id, "room destroyed");
        Ok(())
    }

    pub fn player_room(&self, player_id: &PlayerId) -> Option<RoomId> {
        self.player_rooms.get(player_id).copied()
    }

    pub fn room_handle(&self, room_id: RoomId) -> Option<&RoomHandle> {
        self.rooms.get(&room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.keys().copied().collect()
    }
}
