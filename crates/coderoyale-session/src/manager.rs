//! The session manager: tracks all active player sessions.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Creating sessions when players authenticate
//! - Tracking which players are connected/disconnected
//! - Validating reconnection tokens
//! - Expiring sessions after the grace period
//! - Cleaning up dead sessions to free memory
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself — it uses a plain
//! `HashMap`, not a concurrent one. This is intentional: the session
//! manager is owned by a single task (the server's accept loop) and
//! accessed through a channel or mutex at a higher level. Keeping it
//! simple here avoids hidden locking overhead.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use coderoyale_protocol::PlayerId;
use rand::Rng;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// Manages all active player sessions.
///
/// Think of this as a "registry" — it knows about every player currently
/// connected (or recently disconnected) to the server.
///
/// ## Lifecycle
///
/// ```text
/// authenticate() ──→ create() ──→ disconnect() ──→ reconnect()
///                       │               │                │
///                       │               ▼                │
///                       │          expire_stale()        │
///                       │               │                │
///                       ▼               ▼                ▼
///                    [Connected]   [Disconnected]   [Connected]
///                                      │
///                                      ▼ (after grace period)
///                                  [Expired] ──→ cleanup()
/// ```
pub struct SessionManager {
    /// All active sessions, keyed by player ID.
    ///
    /// `HashMap` is Rust's hash table — O(1) average lookup by key.
    /// We use `PlayerId` as the key because a player can only have
    /// one session at a time.
    sessions: HashMap<PlayerId, Session>,

    /// An index from reconnection tokens to player IDs.
    ///
    /// When a client reconnects, they send a token (not a player ID).
    /// This map lets us quickly find which session the token belongs to
    /// without scanning every session. It's kept in sync with `sessions`.
    tokens: HashMap<String, PlayerId>,

    /// Configuration (grace period, etc.).
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a new, empty session manager with the given config.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            tokens: HashMap::new(),
            config,
        }
    }

    /// Creates a new session for a player after successful authentication.
    ///
    /// Generates a random reconnection token and stores the session.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyConnected`] if the player already
    /// has an active (Connected) session.
    pub fn create(
        &mut self,
        player_id: PlayerId,
    ) -> Result<&Session, SessionError> {
        // Check if this player already has a connected session.
        // `if let` is Rust's way of pattern-matching a single case.
        // It says: "if this value matches the pattern, run this block."
        if let Some(existing) = self.sessions.get(&player_id) {
            if matches!(existing.state, SessionState::Connected) {
                return Err(SessionError::AlreadyConnected(player_id));
            }
            // If they have a disconnected/expired session, remove the
            // old token before creating a new session.
            self.tokens.remove(&existing.reconnect_token);
        }

        let token = generate_token();

        let session = Session {
            player_id,
            state: SessionState::Connected,
            reconnect_token: token.clone(),
        };

        // Insert into both maps to keep them in sync.
        self.tokens.insert(token, player_id);
        self.sessions.insert(player_id, session);

        tracing::info!(%player_id, "session created");

        // `unwrap` is safe here because we just inserted the entry.
        // This is one of the rare cases where unwrap is acceptable —
        // the invariant is guaranteed by the line above.
        Ok(self.sessions.get(&player_id).expect("just inserted"))
    }

    /// Marks a player as disconnected. Starts the reconnection grace period.
    ///
    /// The player's session isn't destroyed yet — they have
    /// `config.reconnect_grace_secs` to reconnect with their token.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if no session exists.
    pub fn disconnect(
        &mut self,
        player_id: PlayerId,
    ) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;

        session.state = SessionState::Disconnected {
            since: Instant::now(),
        };

        tracing::info!(%player_id, "player disconnected, grace period started");
        Ok(())
    }

    /// Reconnects a player using their reconnection token.
    ///
    /// The client sends the token it received during the initial handshake.
    /// If the token is valid and the session hasn't expired, the session
    /// transitions back to Connected.
    ///
    /// # Errors
    /// - [`SessionError::InvalidToken`] — token not recognized
    /// - [`SessionError::SessionExpired`] — grace period elapsed
    pub fn reconnect(
        &mut self,
        token: &str,
    ) -> Result<&Session, SessionError> {
        // Look up which player this token belongs to.
        let player_id = self
            .tokens
            .get(token)
            .copied()
            .ok_or(SessionError::InvalidToken)?;

        let session = self
            .sessions
            .get_mut(&player_id)
            .ok_or(SessionError::InvalidToken)?;

        // Check if the session is in a reconnectable state.
        match &session.state {
            SessionState::Disconnected { since } => {
                let grace =
                    Duration::from_secs(self.config.reconnect_grace_secs);
                if since.elapsed() > grace {
                    // Too late — expire the session.
                    session.state = SessionState::Expired;
                    return Err(SessionError::SessionExpired(player_id));
                }
                // Welcome back!
                session.state = SessionState::Connected;
                tracing::info!(%player_id, "player reconnected");
                Ok(self.sessions.get(&player_id).expect("just modified"))
            }
            SessionState::Connected => {
                Err(SessionError::AlreadyConnected(player_id))
            }
            SessionState::Expired => {
                Err(SessionError::SessionExpired(player_id))
            }
        }
    }

    /// Scans all sessions and expires any that have exceeded the grace period.
    ///
    /// Call this periodically (e.g., every few seconds) to clean up
    /// disconnected players who didn't reconnect in time.
    ///
    /// Returns the list of player IDs that were expired.
    pub fn expire_stale(&mut self) -> Vec<PlayerId> {
        let grace = Duration::from_secs(self.config.reconnect_grace_secs);
        let mut expired = Vec::new();

        for session in self.sessions.values_mut() {
            if let SessionState::Disconnected { since } = &session.state {
                if since.elapsed() > grace {
                    session.state = SessionState::Expired;
                    expired.push(session.player_id);
                    tracing::info!(
                        player_id = %session.player_id,
                        "session expired (grace period elapsed)"
                    );
                }
            }
        }

        expired
    }

    /// Removes all expired sessions, freeing memory.
    ///
    /// Call this after `expire_stale()` to actually remove the dead
    /// sessions from the maps. We separate expiring from cleanup so
    /// that higher layers can react to expirations (e.g., notify the
    /// room that a player is gone for good) before the data is deleted.
    pub fn cleanup_expired(&mut self) {
        // `retain` keeps only entries where the closure returns `true`.
        // It's like `filter` but modifies the map in place.
        self.sessions.retain(|_, session| {
            if matches!(session.state, SessionState::Expired) {
                self.tokens.remove(&session.reconnect_token);
                false // remove this entry
            } else {
                true // keep this entry
            }
        });
    }

    /// Looks up a session by player ID.
    ///
    /// Returns `None` if no session exists for this player.
    pub fn get(&self, player_id: &PlayerId) -> Option<&Session> {
        self.sessions.get(player_id)
    }

    /// Returns the number of active sessions (any state).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Generates a random 32-character hex string (128 bits of entropy).
///
/// This is used as a reconnection token — a secret that only the server
/// and the specific client know. 128 bits is enough that guessing a valid
/// token is computationally infeasible (2^128 possibilities).
///
/// `fn` (not `pub fn`) means this is private to this module — it's an
/// implementation detail, not part of the public API.
fn generate_token() -> String {
    let mut rng = rand::rng();
    // Generate 16 random bytes (128 bits), then format each byte as
    // two hex characters. `{:02x}` means: lowercase hex, zero-padded
    // to 2 digits. So byte 0x0A becomes "0a", byte 0xFF becomes "ff".
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
