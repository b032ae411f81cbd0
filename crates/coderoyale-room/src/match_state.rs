//! Match phase transitions, end detection, and standings ordering.

use std::time::{Duration, Instant};

use coderoyale_protocol::{MatchEndReason, PlayerId, RoomSettings};

use crate::models::Player;

/// `warmupEnd = startAt + 10% of matchDurationSec`.
pub fn warmup_end(start_at: Instant, settings: &RoomSettings) -> Instant {
    let duration = Duration::from_secs(settings.match_duration_sec as u64);
    start_at + duration.mul_f64(0.1)
}

/// `endAt = startAt + matchDurationSec`.
pub fn match_end_at(start_at: Instant, settings: &RoomSettings) -> Instant {
    start_at + Duration::from_secs(settings.match_duration_sec as u64)
}

/// `lastAlive` when `aliveCount <= 1`, `timeExpired` when `now >= endAt`.
/// Checked on every state-modifying event during `warmup`/`main`.
pub fn should_end(end_at: Instant, alive_count: usize, now: Instant) -> Option<MatchEndReason> {
    if alive_count <= 1 {
        Some(MatchEndReason::LastAlive)
    } else if now >= end_at {
        Some(MatchEndReason::TimeExpired)
    } else {
        None
    }
}

/// One non-spectator's standing, for ordering.
#[derive(Debug, Clone, Copy)]
pub struct StandingInput {
    pub player_id: PlayerId,
    pub eliminated: bool,
    pub score: i64,
    pub stack_size: u32,
}

/// Orders standings: alive before eliminated, then higher score, then
/// lower stackSize, then lexicographic playerId. Returns the ordered
/// list; the winner is `ordering[0]` (the single `lastAlive` survivor,
/// or the top-ranked player for `timeExpired`).
pub fn order_standings(mut inputs: Vec<StandingInput>) -> Vec<StandingInput> {
    inputs.sort_by(|a, b| {
        a.eliminated
            .cmp(&b.eliminated)
            .then(b.score.cmp(&a.score))
            .then(a.stack_size.cmp(&b.stack_size))
            .then(a.player_id.0.cmp(&b.player_id.0))
    });
    inputs
}

pub fn winner(ordering: &[StandingInput]) -> Option<PlayerId> {
    ordering.first().map(|s| s.player_id)
}

/// Builds standing inputs from live player state, excluding spectators.
pub fn standing_inputs_from_players<'a>(players: impl Iterator<Item = &'a Player>) -> Vec<StandingInput> {
    players
        .filter(|p| p.role != coderoyale_protocol::PlayerRole::Spectator)
        .map(|p| StandingInput {
            player_id: p.player_id,
            eliminated: p.is_eliminated(),
            score: p.score,
            stack_size: p.stack_size(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(id: u64, eliminated: bool, score: i64, stack: u32) -> StandingInput {
        StandingInput {
            player_id: PlayerId(id),
            eliminated,
            score,
            stack_size: stack,
        }
    }

    #[test]
    fn test_warmup_end_is_ten_percent_of_duration() {
        let start = Instant::now();
        let settings = RoomSettings {
            match_duration_sec: 300,
            ..RoomSettings::default()
        };
        assert_eq!(warmup_end(start, &settings), start + Duration::from_secs(30));
    }

    #[test]
    fn test_should_end_last_alive_takes_priority() {
        let now = Instant::now();
        let end_at = now + Duration::from_secs(100);
        assert_eq!(should_end(end_at, 1, now), Some(MatchEndReason::LastAlive));
        assert_eq!(should_end(end_at, 0, now), Some(MatchEndReason::LastAlive));
    }

    #[test]
    fn test_should_end_time_expired_when_alive_gt_one() {
        let now = Instant::now();
        let end_at = now - Duration::from_secs(1);
        assert_eq!(should_end(end_at, 3, now), Some(MatchEndReason::TimeExpired));
    }

    #[test]
    fn test_should_end_none_mid_match() {
        let now = Instant::now();
        let end_at = now + Duration::from_secs(100);
        assert_eq!(should_end(end_at, 3, now), None);
    }

    #[test]
    fn test_ordering_alive_before_eliminated() {
        let ordered = order_standings(vec![input(1, true, 999, 0), input(2, false, 0, 9)]);
        assert_eq!(ordered[0].player_id, PlayerId(2));
    }

    #[test]
    fn test_ordering_higher_score_first_among_alive() {
        let ordered = order_standings(vec![input(1, false, 10, 0), input(2, false, 30, 0)]);
        assert_eq!(ordered[0].player_id, PlayerId(2));
    }

    #[test]
    fn test_ordering_lower_stack_breaks_score_tie() {
        let ordered = order_standings(vec![input(1, false, 10, 5), input(2, false, 10, 1)]);
        assert_eq!(ordered[0].player_id, PlayerId(2));
    }

    #[test]
    fn test_ordering_lexicographic_player_id_final_tiebreak() {
        let ordered = order_standings(vec![input(5, false, 10, 1), input(2, false, 10, 1)]);
        assert_eq!(ordered[0].player_id, PlayerId(2));
    }

    #[test]
    fn test_winner_is_first_in_ordering() {
        let ordered = order_standings(vec![input(1, true, 0, 0), input(2, false, 5, 0)]);
        assert_eq!(winner(&ordered), Some(PlayerId(2)));
    }

    #[test]
    fn test_winner_of_empty_ordering_is_none() {
        assert_eq!(winner(&[]), None);
    }
}
