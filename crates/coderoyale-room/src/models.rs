//! Domain records the Room exclusively owns for the duration of one
//! room's lifetime: players, the current match, chat, and the event
//! log. Connections are borrowed and may disappear; problems are
//! shared immutable data loaded once by the problem library.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use coderoyale_protocol::{
    ChatMessage, DebuffType, EventLogEntry, MatchEndReason, MatchId, MatchPhase, PlayerId,
    PlayerRole, PlayerStatus, Problem, RoomSettings, ShopItem, TargetingMode,
};
use tokio::sync::mpsc;

use crate::rate_limit::RateLimitState;

/// Outbound channel to a single connected player. `None` for bots,
/// which never hold a connection.
pub type PlayerSender = mpsc::UnboundedSender<coderoyale_protocol::ServerEnvelope>;

/// A debuff currently applied to a player, tracked with a monotonic
/// deadline rather than the wire's millisecond timestamp.
#[derive(Debug, Clone, Copy)]
pub struct ActiveDebuff {
    pub debuff_type: DebuffType,
    pub ends_at: Instant,
}

/// A buff currently applied to a player.
#[derive(Debug, Clone, Copy)]
pub struct ActiveBuff {
    pub buff_type: coderoyale_protocol::BuffType,
    pub ends_at: Instant,
}

/// One record per participant — human, bot, or spectator.
pub struct Player {
    // -- identity --
    pub player_id: PlayerId,
    pub auth_token: String,
    pub username: String,
    pub role: PlayerRole,
    pub is_host: bool,
    pub join_order: u64,

    // -- public --
    pub status: PlayerStatus,
    pub score: i64,
    pub streak: u32,
    pub targeting_mode: TargetingMode,
    pub active_debuff: Option<ActiveDebuff>,
    pub active_buff: Option<ActiveBuff>,

    // -- connection --
    pub connection: Option<PlayerSender>,

    // -- private, match-scoped --
    pub current_problem: Option<Problem>,
    pub queued: VecDeque<Problem>,
    pub code: String,
    pub code_version: u64,
    pub revealed_hints: Vec<String>,
    pub shop_cooldowns: HashMap<ShopItem, Instant>,
    pub last_problem_arrival_at: Instant,
    pub grace_end: Option<Instant>,
    pub rate_limits: HashMap<RateLimitAction, RateLimitState>,

    /// Timestamped attacker ids this player has recently received
    /// attacks from, used by the `attackers` targeting mode.
    pub recent_incoming_attacks: VecDeque<(PlayerId, Instant)>,
}

impl Player {
    pub fn new_human(
        player_id: PlayerId,
        auth_token: String,
        username: String,
        join_order: u64,
        is_host: bool,
    ) -> Self {
        Player {
            player_id,
            auth_token,
            username,
            role: PlayerRole::Player,
            is_host,
            join_order,
            status: PlayerStatus::Lobby,
            score: 0,
            streak: 0,
            targeting_mode: TargetingMode::default(),
            active_debuff: None,
            active_buff: None,
            connection: None,
            current_problem: None,
            queued: VecDeque::new(),
            code: String::new(),
            code_version: 0,
            revealed_hints: Vec::new(),
            shop_cooldowns: HashMap::new(),
            last_problem_arrival_at: Instant::now(),
            grace_end: None,
            rate_limits: HashMap::new(),
            recent_incoming_attacks: VecDeque::new(),
        }
    }

    pub fn new_bot(player_id: PlayerId, username: String, join_order: u64) -> Self {
        Player {
            role: PlayerRole::Bot,
            ..Player::new_human(player_id, String::new(), username, join_order, false)
        }
    }

    pub fn new_spectator(
        player_id: PlayerId,
        auth_token: String,
        username: String,
        join_order: u64,
    ) -> Self {
        Player {
            role: PlayerRole::Spectator,
            ..Player::new_human(player_id, auth_token, username, join_order, false)
        }
    }

    /// `stackSize == len(queued)`; `currentProblem` isn't counted.
    pub fn stack_size(&self) -> u32 {
        self.queued.len() as u32
    }

    pub fn is_eliminated(&self) -> bool {
        self.status == PlayerStatus::Eliminated
    }

    pub fn is_alive_participant(&self) -> bool {
        self.role != PlayerRole::Spectator && !self.is_eliminated()
    }

    pub fn is_in_grace(&self, now: Instant) -> bool {
        self.grace_end.map(|end| now < end).unwrap_or(false)
    }

    pub fn has_memory_leak(&self, now: Instant) -> bool {
        matches!(
            self.active_debuff,
            Some(ActiveDebuff { debuff_type: DebuffType::MemoryLeak, ends_at }) if ends_at > now
        )
    }

    pub fn has_rate_limiter_buff(&self, now: Instant) -> bool {
        matches!(
            self.active_buff,
            Some(ActiveBuff { buff_type: coderoyale_protocol::BuffType::RateLimiter, ends_at }) if ends_at > now
        )
    }
}

/// Keys the per-(player, action) sliding-window rate limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    RunCode,
    SubmitCode,
    CodeUpdate,
    SpectatePlayer,
    SendChat,
}

/// A timed bout inside a Room.
pub struct Match {
    pub match_id: Option<MatchId>,
    pub phase: MatchPhase,
    pub start_at: Option<Instant>,
    pub end_at: Option<Instant>,
    pub end_reason: Option<MatchEndReason>,
    /// Immutable copy of settings taken at `START_MATCH`.
    pub settings: RoomSettings,
    pub next_problem_arrival_at: Option<Instant>,
}

impl Match {
    pub fn lobby(settings: RoomSettings) -> Self {
        Match {
            match_id: None,
            phase: MatchPhase::Lobby,
            start_at: None,
            end_at: None,
            end_reason: None,
            settings,
            next_problem_arrival_at: None,
        }
    }
}

/// The Room: id, settings, lifecycle flag, chat/event history, per-room
/// counters, and the current Match.
pub struct Room {
    pub id: coderoyale_protocol::RoomId,
    pub settings: RoomSettings,
    pub is_created: bool,
    pub players: HashMap<PlayerId, Player>,
    /// The Room's own membership table: gateway-minted player tokens
    /// resolved via `JOIN_ROOM`. Distinct from the connection-layer
    /// reconnect token issued by the session crate.
    pub player_tokens: HashMap<String, PlayerId>,
    pub chat: VecDeque<ChatMessage>,
    pub event_log: Vec<EventLogEntry>,
    pub bot_counter: u64,
    pub join_counter: u64,
    /// Source of the next `MatchId` minted by `START_MATCH`. Outlives
    /// any one `Match`, unlike `match_.match_id` which resets to `None`
    /// on `RETURN_TO_LOBBY`.
    pub match_counter: u64,
    /// Per-player set of problem ids already seen, so sampling never
    /// repeats until the pool is exhausted.
    pub seen_problem_ids: HashMap<PlayerId, std::collections::HashSet<coderoyale_protocol::ProblemId>>,
    pub match_: Match,
    /// Who each spectator (or eliminated player) is currently watching.
    pub spectate_targets: HashMap<PlayerId, PlayerId>,
}

pub const MAX_CHAT_HISTORY: usize = 100;
/// Grace period after a debuff ends during which new debuffs are refused.
pub const GRACE_PERIOD_SECS: u64 = 5;
/// Window within which an incoming attack counts for `attackers` targeting.
pub const ATTACKERS_WINDOW_MS: u64 = 20_000;

impl Room {
    pub fn new(id: coderoyale_protocol::RoomId, settings: RoomSettings) -> Self {
        Room {
            id,
            settings,
            is_created: true,
            players: HashMap::new(),
            player_tokens: HashMap::new(),
            chat: VecDeque::new(),
            event_log: Vec::new(),
            bot_counter: 0,
            join_counter: 0,
            match_counter: 0,
            seen_problem_ids: HashMap::new(),
            match_: Match::lobby(settings),
            spectate_targets: HashMap::new(),
        }
    }

    pub fn username_taken(&self, username: &str) -> bool {
        let lower = username.to_lowercase();
        self.players.values().any(|p| p.username.to_lowercase() == lower)
    }

    pub fn host_id(&self) -> Option<PlayerId> {
        self.players.values().find(|p| p.is_host).map(|p| p.player_id)
    }

    pub fn connected_human_count(&self) -> usize {
        self.players
            .values()
            .filter(|p| p.role == PlayerRole::Player && p.connection.is_some())
            .count()
    }

    /// Transfers host to the earliest-joined connected human player.
    /// Called on host disconnect; no-op if no connected human remains.
    pub fn transfer_host_if_needed(&mut self) {
        if self.host_id().is_some_and(|h| {
            self.players
                .get(&h)
                .map(|p| p.connection.is_some())
                .unwrap_or(false)
        }) {
            return;
        }
        for p in self.players.values_mut() {
            p.is_host = false;
        }
        let next = self
            .players
            .values_mut()
            .filter(|p| p.role == PlayerRole::Player && p.connection.is_some())
            .min_by_key(|p| p.join_order)
            .map(|p| p.player_id);
        if let Some(id) = next {
            if let Some(p) = self.players.get_mut(&id) {
                p.is_host = true;
            }
        }
    }

    pub fn append_chat(&mut self, msg: ChatMessage) {
        self.chat.push_back(msg);
        while self.chat.len() > MAX_CHAT_HISTORY {
            self.chat.pop_front();
        }
    }

    pub fn append_event(&mut self, entry: EventLogEntry) {
        self.event_log.push(entry);
    }

    pub fn alive_participant_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive_participant()).count()
    }

    pub fn non_spectator_count(&self) -> usize {
        self.players.values().filter(|p| p.role != PlayerRole::Spectator).count()
    }

    /// Records an incoming attack against `victim` from `attacker`,
    /// trimming entries outside the attackers-mode window.
    pub fn record_incoming_attack(&mut self, victim: PlayerId, attacker: PlayerId, now: Instant) {
        if let Some(player) = self.players.get_mut(&victim) {
            player.recent_incoming_attacks.push_back((attacker, now));
            let cutoff = now.checked_sub(std::time::Duration::from_millis(ATTACKERS_WINDOW_MS));
            if let Some(cutoff) = cutoff {
                while player
                    .recent_incoming_attacks
                    .front()
                    .is_some_and(|(_, ts)| *ts < cutoff)
                {
                    player.recent_incoming_attacks.pop_front();
                }
            }
        }
    }
}
