//! Wire protocol for CodeRoyale.
//!
//! This crate defines the "language" clients and servers speak:
//!
//! - **Identity** ([`ids`]) — newtypes for player/room/match/problem ids.
//! - **Closed enums** ([`enums`]) — difficulty, debuff/attack/buff
//!   types, targeting modes, match phases, shop items.
//! - **Domain records** ([`problem`], [`chat`], [`settings`]) — the
//!   shapes persisted and sent on the wire.
//! - **Commands** ([`commands`]) — the closed set of client→server
//!   messages.
//! - **Events** ([`events`]) — the closed set of server→client
//!   messages, including the full `ROOM_SNAPSHOT` contract.
//! - **Errors** ([`error_code`], [`error`]) — the canonical error code
//!   set and the protocol layer's own error type.
//! - **Codec** ([`codec`]) — how messages are converted to/from bytes.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and session
//! (player identity). It doesn't know about connections or rooms — it
//! only knows what a message looks like and how to serialize it.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientEnvelope / ServerEnvelope) → Room
//! ```

mod chat;
mod codec;
mod commands;
mod enums;
mod error;
mod error_code;
mod events;
mod ids;
mod problem;
mod settings;

pub use chat::{ChatMessage, EventLogEntry, LogLevel};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use commands::{ClientCommand, ClientEnvelope, SettingsPatch};
pub use enums::{
    AttackIntensity, AttackType, BuffType, DebuffType, Difficulty, DifficultyProfile,
    MatchEndReason, MatchPhase, PlayerRole, PlayerStatus, ProblemType, ShopItem, TargetingMode,
};
pub use error::ProtocolError;
pub use error_code::ErrorCode;
pub use events::{
    ActiveBuff, ActiveDebuff, AttackReceivedPayload, ErrorPayload, JudgeKind, JudgeResultPayload,
    MatchEndPayload, MatchView, PlayerMe, PlayerPublic, PlayerSelfPrivate, PublicTestResult,
    RoomSnapshot, ServerEnvelope, ServerEvent, ShopCatalogEntry, SpectateView, Standing,
};
pub use ids::{MatchId, PlayerId, ProblemId, RoomId};
pub use problem::{ClientProblemView, Problem, ProblemSummary, TestCase};
pub use settings::{
    RoomSettings, MATCH_DURATION_SEC_RANGE, PLAYER_CAP_RANGE, STACK_LIMIT_RANGE,
    STARTING_QUEUED_RANGE,
};
