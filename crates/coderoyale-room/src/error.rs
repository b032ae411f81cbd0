//! Errors raised by room-layer operations, each mapped onto the
//! canonical wire [`ErrorCode`] the Room replies with.

use coderoyale_protocol::{ErrorCode, PlayerId, RoomId};

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("username {0:?} already taken")]
    UsernameTaken(String),

    #[error("player {0} is not a member of room {1}")]
    NotInRoom(PlayerId, RoomId),

    #[error("player {0} is not authorized to perform this action")]
    Forbidden(PlayerId),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("match already started")]
    MatchAlreadyStarted,

    #[error("match has not started")]
    MatchNotStarted,

    #[error("player {0} has been eliminated")]
    PlayerEliminated(PlayerId),

    #[error("insufficient score for this purchase")]
    InsufficientScore,

    #[error("item on cooldown for another {0}ms")]
    ItemOnCooldown(u64),

    #[error("rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("payload too large")]
    PayloadTooLarge,

    #[error("judge unavailable")]
    JudgeUnavailable(Option<u64>),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    #[error("invalid or unknown player token")]
    InvalidToken,
}

impl RoomError {
    /// The canonical code this error reports to the requesting client.
    pub fn code(&self) -> ErrorCode {
        match self {
            RoomError::NotFound(_) => ErrorCode::RoomNotFound,
            RoomError::RoomFull(_) => ErrorCode::RoomFull,
            RoomError::UsernameTaken(_) => ErrorCode::UsernameTaken,
            RoomError::NotInRoom(_, _) => ErrorCode::Unauthorized,
            RoomError::InvalidToken => ErrorCode::Unauthorized,
            RoomError::Forbidden(_) => ErrorCode::Forbidden,
            RoomError::BadRequest(_) => ErrorCode::BadRequest,
            RoomError::MatchAlreadyStarted => ErrorCode::MatchAlreadyStarted,
            RoomError::MatchNotStarted => ErrorCode::MatchNotStarted,
            RoomError::PlayerEliminated(_) => ErrorCode::PlayerEliminated,
            RoomError::InsufficientScore => ErrorCode::InsufficientScore,
            RoomError::ItemOnCooldown(_) => ErrorCode::ItemOnCooldown,
            RoomError::RateLimited(_) => ErrorCode::RateLimited,
            RoomError::PayloadTooLarge => ErrorCode::PayloadTooLarge,
            RoomError::JudgeUnavailable(_) => ErrorCode::JudgeUnavailable,
            RoomError::Internal(_) | RoomError::Unavailable(_) => ErrorCode::InternalError,
        }
    }

    /// `retryAfterMs` to attach to the `ERROR` payload, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            RoomError::RateLimited(ms) => Some(*ms),
            RoomError::ItemOnCooldown(ms) => Some(*ms),
            RoomError::JudgeUnavailable(ms) => *ms,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_room_not_found() {
        assert_eq!(RoomError::NotFound(RoomId(1)).code(), ErrorCode::RoomNotFound);
    }

    #[test]
    fn test_rate_limited_carries_retry_after() {
        let err = RoomError::RateLimited(1500);
        assert_eq!(err.code(), ErrorCode::RateLimited);
        assert_eq!(err.retry_after_ms(), Some(1500));
    }

    #[test]
    fn test_internal_and_unavailable_both_map_to_internal_error() {
        assert_eq!(RoomError::Internal("x".into()).code(), ErrorCode::InternalError);
        assert_eq!(RoomError::Unavailable(RoomId(1)).code(), ErrorCode::InternalError);
    }

    #[test]
    fn test_invalid_token_maps_to_unauthorized() {
        assert_eq!(RoomError::InvalidToken.code(), ErrorCode::Unauthorized);
    }
}
