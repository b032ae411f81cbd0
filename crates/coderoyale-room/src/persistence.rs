//! Snapshot serialization and cold-start restoration.
//!
//! `Instant` has no fixed epoch and can't cross a process restart, so
//! every snapshot stores times as milliseconds since `UNIX_EPOCH` and
//! remaps them back to `Instant` on restore using the current
//! `(Instant::now(), SystemTime::now())` pair as the reference point.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use coderoyale_protocol::{
    ChatMessage, EventLogEntry, MatchEndReason, MatchId, MatchPhase, PlayerId, PlayerRole,
    PlayerStatus, Problem, ProblemId, RoomId, RoomSettings, TargetingMode,
};
use serde::{Deserialize, Serialize};

use crate::models::{Match, Player, Room};

pub(crate) fn instant_to_epoch_ms(instant: Instant, now_instant: Instant, now_system: SystemTime) -> u64 {
    let system_time = if instant >= now_instant {
        now_system + (instant - now_instant)
    } else {
        now_system - (now_instant - instant)
    };
    system_time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

fn epoch_ms_to_instant(ms: u64, now_instant: Instant, now_system: SystemTime) -> Instant {
    let target = UNIX_EPOCH + Duration::from_millis(ms);
    match target.duration_since(now_system) {
        Ok(ahead) => now_instant + ahead,
        Err(err) => now_instant - err.duration(),
    }
}

/// One player's persisted fields. Connection handles never persist —
/// every restored player starts disconnected until it reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub auth_token: String,
    pub username: String,
    pub role: PlayerRole,
    pub is_host: bool,
    pub join_order: u64,
    pub status: PlayerStatus,
    pub score: i64,
    pub streak: u32,
    pub targeting_mode: TargetingMode,
    pub current_problem: Option<Problem>,
    pub queued: Vec<Problem>,
    pub code: String,
    pub code_version: u64,
    pub revealed_hints: Vec<String>,
    pub last_problem_arrival_at_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: Option<MatchId>,
    pub phase: MatchPhase,
    pub start_at_ms: Option<u64>,
    pub end_at_ms: Option<u64>,
    pub end_reason: Option<MatchEndReason>,
    pub settings: RoomSettings,
}

/// The full snapshot written after every state-modifying event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshotRecord {
    pub room_id: RoomId,
    pub settings: RoomSettings,
    pub players: Vec<PlayerRecord>,
    pub chat: Vec<ChatMessage>,
    pub event_log: Vec<EventLogEntry>,
    pub bot_counter: u64,
    pub join_counter: u64,
    pub match_counter: u64,
    pub seen_problem_ids: HashMap<PlayerId, Vec<ProblemId>>,
    pub match_record: MatchRecord,
    pub next_problem_arrival_at_ms: Option<u64>,
}

/// Builds a snapshot of `room` as of `now`.
pub fn snapshot(room: &Room, now_instant: Instant, now_system: SystemTime) -> RoomSnapshotRecord {
    let to_ms = |i: Instant| instant_to_epoch_ms(i, now_instant, now_system);
    RoomSnapshotRecord {
        room_id: room.id,
        settings: room.settings,
        players: room
            .players
            .values()
            .map(|p| PlayerRecord {
                player_id: p.player_id,
                auth_token: p.auth_token.clone(),
                username: p.username.clone(),
                role: p.role,
                is_host: p.is_host,
                join_order: p.join_order,
                status: p.status,
                score: p.score,
                streak: p.streak,
                targeting_mode: p.targeting_mode,
                current_problem: p.current_problem.clone(),
                queued: p.queued.iter().cloned().collect(),
                code: p.code.clone(),
                code_version: p.code_version,
                revealed_hints: p.revealed_hints.clone(),
                last_problem_arrival_at_ms: Some(to_ms(p.last_problem_arrival_at)),
            })
            .collect(),
        chat: room.chat.iter().cloned().collect(),
        event_log: room.event_log.clone(),
        bot_counter: room.bot_counter,
        join_counter: room.join_counter,
        match_counter: room.match_counter,
        seen_problem_ids: room
            .seen_problem_ids
            .iter()
            .map(|(id, set)| (*id, set.iter().copied().collect()))
            .collect(),
        match_record: MatchRecord {
            match_id: room.match_.match_id,
            phase: room.match_.phase,
            start_at_ms: room.match_.start_at.map(to_ms),
            end_at_ms: room.match_.end_at.map(to_ms),
            end_reason: room.match_.end_reason,
            settings: room.match_.settings,
        },
        next_problem_arrival_at_ms: room.match_.next_problem_arrival_at.map(to_ms),
    }
}

/// Restores a `Room` from a snapshot. Players missing
/// `lastProblemArrivalAt` default to `startAt` (or `now` in lobby).
/// All connections start absent; the caller reattaches them as players
/// reconnect.
pub fn restore(
    record: RoomSnapshotRecord,
    now_instant: Instant,
    now_system: SystemTime,
) -> Room {
    let from_ms = |ms: u64| epoch_ms_to_instant(ms, now_instant, now_system);
    let start_at = record.match_record.start_at_ms.map(from_ms);

    let mut room = Room::new(record.room_id, record.settings);
    room.bot_counter = record.bot_counter;
    room.join_counter = record.join_counter;
    room.match_counter = record.match_counter;
    room.chat = record.chat.into_iter().collect();
    room.event_log = record.event_log;
    room.seen_problem_ids = record
        .seen_problem_ids
        .into_iter()
        .map(|(id, ids)| (id, ids.into_iter().collect::<HashSet<_>>()))
        .collect();

    room.match_ = Match {
        match_id: record.match_record.match_id,
        phase: record.match_record.phase,
        start_at,
        end_at: record.match_record.end_at_ms.map(from_ms),
        end_reason: record.match_record.end_reason,
        settings: record.match_record.settings,
        next_problem_arrival_at: record.next_problem_arrival_at_ms.map(from_ms),
    };

    for pr in record.players {
        let default_arrival = start_at.unwrap_or(now_instant);
        let mut player = Player::new_human(
            pr.player_id,
            pr.auth_token,
            pr.username,
            pr.join_order,
            pr.is_host,
        );
        player.role = pr.role;
        player.status = pr.status;
        player.score = pr.score;
        player.streak = pr.streak;
        player.targeting_mode = pr.targeting_mode;
        player.current_problem = pr.current_problem;
        player.queued = VecDeque::from(pr.queued);
        player.code = pr.code;
        player.code_version = pr.code_version;
        player.revealed_hints = pr.revealed_hints;
        player.last_problem_arrival_at = pr
            .last_problem_arrival_at_ms
            .map(from_ms)
            .unwrap_or(default_arrival);
        room.players.insert(player.player_id, player);
    }

    let tokens: Vec<(String, PlayerId)> = room
        .players
        .values()
        .filter(|p| !p.auth_token.is_empty())
        .map(|p| (p.auth_token.clone(), p.player_id))
        .collect();
    for (token, player_id) in tokens {
        room.player_tokens.insert(token, player_id);
    }

    room
}

/// Serialized record written once per finished match to the Results
/// Store (`matches` table per the external contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishedMatchRecord {
    pub match_id: MatchId,
    pub room_id: RoomId,
    pub started_at_ms: u64,
    pub ended_at_ms: u64,
    pub end_reason: MatchEndReason,
    pub settings: RoomSettings,
}

/// One row of `match_players` per non-spectator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPlayerRecord {
    pub match_id: MatchId,
    pub player_id: PlayerId,
    pub username: String,
    pub role: PlayerRole,
    pub score: i64,
    pub rank: u32,
    pub eliminated_at_ms: Option<u64>,
}

/// Where room snapshots and finished-match records are written. The
/// Room is generic over this (like [`crate::judge::JudgeClient`])
/// rather than holding a trait object.
pub trait SnapshotStore: Send + Sync {
    fn save_snapshot(
        &self,
        snapshot: &RoomSnapshotRecord,
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;

    fn load_snapshot(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<RoomSnapshotRecord>, std::io::Error>> + Send;

    fn save_finished_match(
        &self,
        record: &FinishedMatchRecord,
        players: &[MatchPlayerRecord],
    ) -> impl std::future::Future<Output = Result<(), std::io::Error>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderoyale_protocol::RoomId;

    #[test]
    fn test_snapshot_restore_round_trips_scores_and_phase() {
        let now_instant = Instant::now();
        let now_system = SystemTime::now();
        let mut room = Room::new(RoomId(1), RoomSettings::default());
        let mut player = Player::new_human(PlayerId(1), "tok".into(), "alice".into(), 0, true);
        player.score = 42;
        player.streak = 2;
        room.players.insert(player.player_id, player);
        room.match_.phase = MatchPhase::Main;
        room.match_.match_id = Some(MatchId(1));
        room.match_.start_at = Some(now_instant - Duration::from_secs(30));

        let record = snapshot(&room, now_instant, now_system);
        let json = serde_json::to_vec(&record).unwrap();
        let decoded: RoomSnapshotRecord = serde_json::from_slice(&json).unwrap();

        let restored = restore(decoded, now_instant, now_system);
        assert_eq!(restored.match_.phase, MatchPhase::Main);
        assert_eq!(restored.players[&PlayerId(1)].score, 42);
        assert_eq!(restored.players[&PlayerId(1)].streak, 2);
        assert!(restored.players[&PlayerId(1)].connection.is_none());
    }

    #[test]
    fn test_restore_defaults_missing_arrival_to_start_at() {
        let now_instant = Instant::now();
        let now_system = SystemTime::now();
        let start_at = now_instant - Duration::from_secs(10);

        let record = RoomSnapshotRecord {
            room_id: RoomId(1),
            settings: RoomSettings::default(),
            players: vec![PlayerRecord {
                player_id: PlayerId(1),
                auth_token: "t".into(),
                username: "u".into(),
                role: PlayerRole::Player,
                is_host: true,
                join_order: 0,
                status: PlayerStatus::Coding,
                score: 0,
                streak: 0,
                targeting_mode: TargetingMode::Random,
                current_problem: None,
                queued: vec![],
                code: String::new(),
                code_version: 1,
                revealed_hints: vec![],
                last_problem_arrival_at_ms: None,
            }],
            chat: vec![],
            event_log: vec![],
            bot_counter: 0,
            join_counter: 1,
            match_counter: 1,
            seen_problem_ids: HashMap::new(),
            match_record: MatchRecord {
                match_id: Some(MatchId(1)),
                phase: MatchPhase::Main,
                start_at_ms: Some(instant_to_epoch_ms(start_at, now_instant, now_system)),
                end_at_ms: None,
                end_reason: None,
                settings: RoomSettings::default(),
            },
            next_problem_arrival_at_ms: None,
        };

        let restored = restore(record, now_instant, now_system);
        let player = &restored.players[&PlayerId(1)];
        let delta = player
            .last_problem_arrival_at
            .saturating_duration_since(start_at);
        assert!(delta < Duration::from_millis(5));
    }
}
