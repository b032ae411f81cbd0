//! Room lifecycle management for CodeRoyale.
//!
//! Each room runs as an isolated Tokio task (actor model) holding the
//! authoritative state for one game instance: players, the current
//! match, chat, and the event log. Pure-logic modules (`attack`,
//! `targeting`, `rate_limit`, `scheduler`, `match_state`, `shop`,
//! `problems`) are deliberately free of actor/channel concerns so they
//! stay unit-testable without spinning up Tokio.

mod attack;
mod error;
mod judge;
mod manager;
mod match_state;
mod models;
mod persistence;
mod problems;
mod rate_limit;
mod room;
mod scheduler;
mod shop;
mod targeting;

pub use error::RoomError;
pub use judge::{InFlightTracker, JudgeClient, JudgeError, ResultCache};
pub use manager::RoomManager;
pub use models::{ActiveBuff, ActiveDebuff, Match, Player, PlayerSender, RateLimitAction, Room};
pub use persistence::{FinishedMatchRecord, MatchPlayerRecord, MatchRecord, PlayerRecord, RoomSnapshotRecord, SnapshotStore};
pub use problems::ProblemLibrary;
pub use room::{spawn_room, RegisterOutcome, RoomActor, RoomCommand, RoomDiagnostics, RoomHandle};
