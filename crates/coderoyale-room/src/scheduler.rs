//! Per-player problem arrival scheduling: the effective interval
//! formula, who fires on a given wakeup, and the single earliest-wakeup
//! instant the Room arms on [`crate::AlarmScheduler`].

use std::time::{Duration, Instant};

use coderoyale_protocol::{MatchPhase, PlayerId};

use crate::models::{Match, Player};

const WARMUP_BASE_SECS: u64 = 90;
const MAIN_BASE_SECS: u64 = 60;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// `base(phase) × (hasMemoryLeak ? 0.5 : 1) × (hasRateLimiter ? 2 : 1)`.
/// Returns `None` for an eliminated or disconnected-irrelevant player
/// (callers filter those out before calling); the base itself only
/// applies to `warmup`/`main`.
pub fn effective_interval(phase: MatchPhase, player: &Player, now: Instant) -> Option<Duration> {
    let base_secs = match phase {
        MatchPhase::Warmup => WARMUP_BASE_SECS,
        MatchPhase::Main => MAIN_BASE_SECS,
        MatchPhase::Lobby | MatchPhase::Ended => return None,
    };
    let mut secs = base_secs as f64;
    if player.has_memory_leak(now) {
        secs *= 0.5;
    }
    if player.has_rate_limiter_buff(now) {
        secs *= 2.0;
    }
    Some(Duration::from_secs_f64(secs).max(MIN_INTERVAL))
}

/// Players whose effective interval has elapsed since their last
/// arrival, as of `now`. Eliminated players and spectators are never
/// eligible for an arrival and must be filtered out by the caller
/// before this runs.
pub fn due_players<'a>(
    phase: MatchPhase,
    players: impl Iterator<Item = &'a Player>,
    now: Instant,
) -> Vec<PlayerId> {
    players
        .filter_map(|p| {
            let interval = effective_interval(phase, p, now)?;
            if now.saturating_duration_since(p.last_problem_arrival_at) >= interval {
                Some(p.player_id)
            } else {
                None
            }
        })
        .collect()
}

/// Computes the Room's next scheduler wakeup:
/// `min(perPlayer(lastArrival + effectiveInterval), warmupEnd?, matchEnd)`,
/// floored at `now + 1s`. `None` if there's nothing left to schedule
/// (no eligible players and no pending phase boundary).
pub fn next_wakeup<'a>(
    match_: &Match,
    eligible_players: impl Iterator<Item = &'a Player>,
    warmup_end: Option<Instant>,
    now: Instant,
) -> Option<Instant> {
    let mut earliest: Option<Instant> = None;

    for player in eligible_players {
        if let Some(interval) = effective_interval(match_.phase, player, now) {
            let candidate = player.last_problem_arrival_at + interval;
            earliest = Some(earliest.map_or(candidate, |e| e.min(candidate)));
        }
    }

    if let Some(warmup_end) = warmup_end {
        earliest = Some(earliest.map_or(warmup_end, |e| e.min(warmup_end)));
    }

    if let Some(match_end) = match_.end_at {
        earliest = Some(earliest.map_or(match_end, |e| e.min(match_end)));
    }

    earliest.map(|instant| instant.max(now + MIN_INTERVAL))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coderoyale_protocol::{BuffType, DebuffType, RoomSettings};
    use crate::models::{ActiveBuff, ActiveDebuff};

    fn player() -> Player {
        Player::new_human(PlayerId(1), "t".into(), "u".into(), 0, false)
    }

    #[test]
    fn test_base_interval_warmup_vs_main() {
        let now = Instant::now();
        let p = player();
        assert_eq!(
            effective_interval(MatchPhase::Warmup, &p, now),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            effective_interval(MatchPhase::Main, &p, now),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_lobby_and_ended_have_no_interval() {
        let now = Instant::now();
        let p = player();
        assert_eq!(effective_interval(MatchPhase::Lobby, &p, now), None);
        assert_eq!(effective_interval(MatchPhase::Ended, &p, now), None);
    }

    #[test]
    fn test_memory_leak_halves_interval() {
        let now = Instant::now();
        let mut p = player();
        p.active_debuff = Some(ActiveDebuff {
            debuff_type: DebuffType::MemoryLeak,
            ends_at: now + Duration::from_secs(30),
        });
        assert_eq!(
            effective_interval(MatchPhase::Main, &p, now),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_rate_limiter_buff_doubles_interval() {
        let now = Instant::now();
        let mut p = player();
        p.active_buff = Some(ActiveBuff {
            buff_type: BuffType::RateLimiter,
            ends_at: now + Duration::from_secs(30),
        });
        assert_eq!(
            effective_interval(MatchPhase::Main, &p, now),
            Some(Duration::from_secs(120))
        );
    }

    #[test]
    fn test_combined_modifiers_compose() {
        let now = Instant::now();
        let mut p = player();
        p.active_debuff = Some(ActiveDebuff {
            debuff_type: DebuffType::MemoryLeak,
            ends_at: now + Duration::from_secs(30),
        });
        p.active_buff = Some(ActiveBuff {
            buff_type: BuffType::RateLimiter,
            ends_at: now + Duration::from_secs(30),
        });
        // 60 * 0.5 * 2 = 60.
        assert_eq!(
            effective_interval(MatchPhase::Main, &p, now),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_next_wakeup_picks_minimum_across_players_and_match_end() {
        let now = Instant::now();
        let settings = RoomSettings::default();
        let mut match_ = Match::lobby(settings);
        match_.phase = MatchPhase::Main;
        match_.end_at = Some(now + Duration::from_secs(200));

        let mut p1 = player();
        p1.last_problem_arrival_at = now;
        let mut p2 = Player::new_human(PlayerId(2), "t".into(), "u2".into(), 1, false);
        p2.last_problem_arrival_at = now - Duration::from_secs(50);

        let players = vec![p1, p2];
        let wakeup = next_wakeup(&match_, players.iter(), None, now).unwrap();
        // p2 fires at now - 50 + 60 = now + 10.
        assert_eq!(wakeup, now + Duration::from_secs(10));
    }

    #[test]
    fn test_next_wakeup_floors_at_one_second() {
        let now = Instant::now();
        let settings = RoomSettings::default();
        let mut match_ = Match::lobby(settings);
        match_.phase = MatchPhase::Main;

        let mut p = player();
        p.last_problem_arrival_at = now - Duration::from_secs(59);
        let players = vec![p];
        let wakeup = next_wakeup(&match_, players.iter(), None, now).unwrap();
        assert!(wakeup >= now + MIN_INTERVAL);
    }

    #[test]
    fn test_due_players_fires_only_past_interval() {
        let now = Instant::now();
        let mut not_due = player();
        not_due.last_problem_arrival_at = now;
        let mut due = Player::new_human(PlayerId(2), "t".into(), "u2".into(), 1, false);
        due.last_problem_arrival_at = now - Duration::from_secs(61);

        let players = vec![not_due, due];
        let result = due_players(MatchPhase::Main, players.iter(), now);
        assert_eq!(result, vec![PlayerId(2)]);
    }

    #[test]
    fn test_next_wakeup_respects_warmup_end() {
        let now = Instant::now();
        let settings = RoomSettings::default();
        let mut match_ = Match::lobby(settings);
        match_.phase = MatchPhase::Warmup;
        let warmup_end = now + Duration::from_secs(5);

        let mut p = player();
        p.last_problem_arrival_at = now;
        let players = vec![p];
        let wakeup = next_wakeup(&match_, players.iter(), Some(warmup_end), now).unwrap();
        assert_eq!(wakeup, warmup_end);
    }
}
