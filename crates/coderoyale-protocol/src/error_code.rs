//! The closed set of error codes a `ServerEvent::Error` can carry.
//!
//! Every rejection path in the room and server layers must resolve to
//! one of these — there is no open-ended string error on the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    RoomNotFound,
    RoomFull,
    UsernameTaken,
    MatchAlreadyStarted,
    MatchNotStarted,
    PlayerEliminated,
    InsufficientScore,
    ItemOnCooldown,
    RateLimited,
    PayloadTooLarge,
    JudgeUnavailable,
    InternalError,
}
