//! Server → client events: the closed set of outbound message types,
//! plus the view types (`ROOM_SNAPSHOT` and friends) they carry.

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, EventLogEntry};
use crate::enums::{
    AttackType, BuffType, DebuffType, MatchEndReason, MatchPhase, PlayerRole, PlayerStatus,
    TargetingMode,
};
use crate::error_code::ErrorCode;
use crate::ids::{MatchId, PlayerId, ProblemId, RoomId};
use crate::problem::{ClientProblemView, ProblemSummary};

/// A time-bounded debuff currently applied to a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveDebuff {
    pub debuff_type: DebuffType,
    pub ends_at_ms: u64,
}

/// A time-bounded buff currently applied to a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveBuff {
    pub buff_type: BuffType,
    pub ends_at_ms: u64,
}

/// Everything about a player that every other participant can see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerPublic {
    pub player_id: PlayerId,
    pub username: String,
    pub role: PlayerRole,
    pub is_host: bool,
    pub join_order: u64,
    pub status: PlayerStatus,
    pub score: i64,
    pub streak: u32,
    pub targeting_mode: TargetingMode,
    pub stack_size: u32,
    pub active_debuff: Option<ActiveDebuff>,
    pub active_buff: Option<ActiveBuff>,
}

/// The `me` field of a `ROOM_SNAPSHOT`: identity as seen by the
/// recipient's own connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMe {
    pub player_id: PlayerId,
    pub username: String,
    pub role: PlayerRole,
    pub is_host: bool,
    pub status: PlayerStatus,
}

/// The `self` field of a `ROOM_SNAPSHOT`: private state only the
/// owning connection ever receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSelfPrivate {
    pub current_problem: Option<ClientProblemView>,
    pub queued: Vec<ProblemSummary>,
    pub code: String,
    pub code_version: u64,
    pub revealed_hints: Vec<String>,
    pub shop_cooldowns: std::collections::HashMap<String, u64>,
}

/// One row of the match-end standings table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub player_id: PlayerId,
    pub username: String,
    pub rank: u32,
    pub score: i64,
    pub stack_size: u32,
    pub eliminated: bool,
}

/// The `match` field of a `ROOM_SNAPSHOT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub match_id: Option<MatchId>,
    pub phase: MatchPhase,
    pub start_at_ms: Option<u64>,
    pub end_at_ms: Option<u64>,
    pub end_reason: Option<MatchEndReason>,
    pub settings: crate::settings::RoomSettings,
    pub standings: Option<Vec<Standing>>,
}

/// Who a spectator (or eliminated player) is currently watching, if
/// anyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectateView {
    pub target_player_id: PlayerId,
    pub current_problem: Option<ClientProblemView>,
    pub code: String,
    pub code_version: u64,
}

/// One row of the shop catalog as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCatalogEntry {
    pub item: crate::enums::ShopItem,
    pub cost: i64,
    pub cooldown_secs: Option<u64>,
}

/// The full `ROOM_SNAPSHOT` contract (§6 EXTERNAL INTERFACES).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub server_time_ms: u64,
    pub me: PlayerMe,
    pub players: Vec<PlayerPublic>,
    #[serde(rename = "match")]
    pub match_view: MatchView,
    pub shop_catalog: Vec<ShopCatalogEntry>,
    #[serde(rename = "self", skip_serializing_if = "Option::is_none")]
    pub self_private: Option<PlayerSelfPrivate>,
    pub spectating: Option<SpectateView>,
    pub chat: Vec<ChatMessage>,
    pub event_log: Vec<EventLogEntry>,
}

/// Result of a `RUN_CODE` or `SUBMIT_CODE` judge round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeResultPayload {
    pub kind: JudgeKind,
    pub problem_id: ProblemId,
    pub passed: bool,
    pub public_tests: Vec<PublicTestResult>,
    pub runtime_ms: Option<u64>,
    pub hidden_tests_passed: Option<u32>,
    pub hidden_failure_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeKind {
    Run,
    Submit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicTestResult {
    pub passed: bool,
    pub actual_output: String,
}

/// An attack notification sent to the victim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackReceivedPayload {
    pub attacker_id: PlayerId,
    pub attack_type: AttackType,
    pub ends_at_ms: Option<u64>,
}

/// The outcome of a finished match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchEndPayload {
    pub reason: MatchEndReason,
    pub winner: Option<PlayerId>,
    pub standings: Vec<Standing>,
}

/// An error reply, always echoing the triggering command's `requestId`
/// via the enclosing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    pub retry_after_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    RoomSnapshot(RoomSnapshot),
    SettingsUpdate(crate::settings::RoomSettings),
    MatchStarted(MatchView),
    MatchPhaseUpdate { phase: MatchPhase },
    PlayerUpdate(PlayerPublic),
    JudgeResult(JudgeResultPayload),
    StackUpdate { player_id: PlayerId, stack_size: u32 },
    ChatAppend(ChatMessage),
    AttackReceived(AttackReceivedPayload),
    EventLogAppend(EventLogEntry),
    SpectateState(Option<SpectateView>),
    CodeUpdate { player_id: PlayerId, code: String, version: u64 },
    MatchEnd(MatchEndPayload),
    Error(ErrorPayload),
}

/// The envelope every server message goes out in: `{type, requestId?, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub event: ServerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_phase_update_round_trip() {
        let event = ServerEvent::MatchPhaseUpdate { phase: MatchPhase::Main };
        let env = ServerEnvelope { request_id: None, event: event.clone() };
        let bytes = serde_json::to_vec(&env).unwrap();
        let decoded: ServerEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.event, event);
    }

    #[test]
    fn test_error_payload_echoes_request_id() {
        let env = ServerEnvelope {
            request_id: Some("r9".into()),
            event: ServerEvent::Error(ErrorPayload {
                code: ErrorCode::RateLimited,
                message: "too fast".into(),
                retry_after_ms: Some(500),
            }),
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"requestId\":\"r9\""));
        assert!(json.contains("\"RATE_LIMITED\""));
    }

    #[test]
    fn test_stack_update_shape() {
        let event = ServerEvent::StackUpdate { player_id: PlayerId(1), stack_size: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"STACK_UPDATE\""));
    }
}
