//! Client → server commands: the closed set from the command table.
//!
//! Every command arrives wrapped in a [`ClientEnvelope`] that adds an
//! optional `requestId` the server echoes back on the matching
//! response or error, so callers can implement request/response
//! semantics over what is otherwise a push-based duplex stream.

use serde::{Deserialize, Serialize};

use crate::enums::{ShopItem, TargetingMode};
use crate::ids::ProblemId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientCommand {
    JoinRoom {
        token: String,
    },
    SendChat {
        text: String,
    },
    UpdateSettings {
        patch: SettingsPatch,
    },
    AddBots {
        count: u32,
    },
    StartMatch,
    SetTargetMode {
        mode: TargetingMode,
    },
    RunCode {
        problem_id: ProblemId,
        code: String,
    },
    SubmitCode {
        problem_id: ProblemId,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        option_id: Option<String>,
    },
    SpendPoints {
        item: ShopItem,
    },
    SpectatePlayer {
        target_player_id: crate::ids::PlayerId,
    },
    StopSpectate,
    CodeUpdate {
        code: String,
        version: u64,
    },
    ReturnToLobby,
}

/// A partial update to [`crate::RoomSettings`]; every field is
/// optional so `UPDATE_SETTINGS` can patch just one knob at a time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub match_duration_sec: Option<u32>,
    pub player_cap: Option<u32>,
    pub stack_limit: Option<u32>,
    pub starting_queued: Option<u32>,
    pub difficulty_profile: Option<crate::enums::DifficultyProfile>,
    pub attack_intensity: Option<crate::enums::AttackIntensity>,
}

/// The envelope every client message arrives in: `{type, requestId?, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub command: ClientCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_room_decodes() {
        let json = r#"{"type":"JOIN_ROOM","requestId":"r1","payload":{"token":"abc"}}"#;
        let env: ClientEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.request_id.as_deref(), Some("r1"));
        assert_eq!(
            env.command,
            ClientCommand::JoinRoom { token: "abc".into() }
        );
    }

    #[test]
    fn test_start_match_unit_variant() {
        let json = r#"{"type":"START_MATCH","payload":null}"#;
        let env: ClientEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.command, ClientCommand::StartMatch);
    }

    #[test]
    fn test_submit_code_round_trip() {
        let cmd = ClientCommand::SubmitCode {
            problem_id: ProblemId(4),
            code: Some("fn main(){}".into()),
            option_id: None,
        };
        let env = ClientEnvelope {
            request_id: None,
            command: cmd.clone(),
        };
        let bytes = serde_json::to_vec(&env).unwrap();
        let decoded: ClientEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded.command, cmd);
    }

    #[test]
    fn test_settings_patch_allows_partial() {
        let json = r#"{"matchDurationSec":120}"#;
        let patch: SettingsPatch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.match_duration_sec, Some(120));
        assert_eq!(patch.player_cap, None);
    }
}
