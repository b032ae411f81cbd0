//! Chat and event-log entries.

use serde::{Deserialize, Serialize};

use crate::ids::PlayerId;

/// A single chat line, broadcast to everyone in the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub player_id: PlayerId,
    pub username: String,
    pub text: String,
    pub sent_at_ms: u64,
}

/// Severity of an [`EventLogEntry`], mirrored from the server's own
/// structured logging levels so the in-room log reads the same way the
/// operator's logs do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A room-visible record of something that happened: a join, an
/// elimination, an attack, a match start or end. Distinct from the
/// operator-facing `tracing` log — this one is replayed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLogEntry {
    pub level: LogLevel,
    pub message: String,
    pub at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_round_trip() {
        let msg = ChatMessage {
            player_id: PlayerId(1),
            username: "alice".into(),
            text: "gg".into(),
            sent_at_ms: 1000,
        };
        let bytes = serde_json::to_vec(&msg).unwrap();
        let decoded: ChatMessage = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn test_log_level_lowercase() {
        assert_eq!(serde_json::to_string(&LogLevel::Warn).unwrap(), "\"warn\"");
    }
}
