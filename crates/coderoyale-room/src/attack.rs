//! Attack engine: turns a passing submit into a score award, a streak
//! update, and (unless the streak just hit its memory-leak multiple) a
//! targeted attack against another player.
//!
//! `garbageDrop` pushes onto the *front* of the victim's queue. The
//! queue is drained from the front on every advance-to-next, so "top of
//! the stack" and "front of the queue" name the same slot: the next
//! problem the victim will see. Timed arrivals push onto the back.

use std::time::{Duration, Instant};

use coderoyale_protocol::{AttackIntensity, AttackType, Difficulty, PlayerId, Problem};
use rand::Rng;

use crate::models::{ActiveDebuff, Player};
use crate::targeting::Candidate;

/// The outcome of scoring a passing submit, before a target has been
/// chosen. `attack` is `None` only when the solved problem was itself
/// garbage (no score, no streak change, no attack).
pub struct SubmitOutcome {
    pub score_delta: i64,
    pub new_streak: u32,
    pub attack: Option<AttackType>,
}

/// Scores a passing submit and determines what attack it launches.
/// Call this before selecting a target.
pub fn resolve_submit(problem: &Problem, streak_before: u32, rng: &mut impl Rng) -> SubmitOutcome {
    if problem.is_garbage {
        return SubmitOutcome {
            score_delta: 0,
            new_streak: streak_before,
            attack: None,
        };
    }

    let score_delta = problem.difficulty.score_reward() as i64;
    let new_streak = streak_before + 1;
    SubmitOutcome {
        score_delta,
        new_streak,
        attack: Some(roll_attack_type(problem.difficulty, new_streak, rng)),
    }
}

/// `streak % 3 == 0` (and `streak > 0`) always overrides to
/// `memoryLeak`, regardless of difficulty. Otherwise the attack type is
/// keyed by difficulty: easy always drops garbage, medium flips a coin
/// between `flashbang` and `vimLock` (p = 0.5 each), hard always
/// launches `ddos`.
pub fn roll_attack_type(difficulty: Difficulty, streak: u32, rng: &mut impl Rng) -> AttackType {
    if streak > 0 && streak % 3 == 0 {
        return AttackType::MemoryLeak;
    }
    match difficulty {
        Difficulty::Easy => AttackType::GarbageDrop,
        Difficulty::Medium => roll_medium_attack(streak, rng),
        Difficulty::Hard => AttackType::Ddos,
    }
}

fn roll_medium_attack(streak: u32, rng: &mut impl Rng) -> AttackType {
    if streak > 0 && streak % 3 == 0 {
        return AttackType::MemoryLeak;
    }
    if rng.random_bool(0.5) {
        AttackType::Flashbang
    } else {
        AttackType::VimLock
    }
}

/// Builds the `Candidate` pool eligible to be targeted: alive
/// participants, not the attacker, not a spectator, not currently in
/// grace.
pub fn eligible_targets<'a>(
    players: impl Iterator<Item = &'a Player>,
    attacker_id: PlayerId,
    now: Instant,
) -> Vec<Candidate> {
    players
        .filter(|p| p.player_id != attacker_id)
        .filter(|p| p.is_alive_participant())
        .filter(|p| !p.is_in_grace(now))
        .map(|p| Candidate {
            player_id: p.player_id,
            score: p.score,
            stack_size: p.stack_size(),
        })
        .collect()
}

/// Applies a resolved attack to its victim: for `garbageDrop`, pushes a
/// garbage problem to the front of the queue. For every other attack
/// type, sets the corresponding debuff with a duration scaled by
/// `intensity`. Returns the debuff's end instant for broadcasting, if
/// one was set.
pub fn apply_attack(
    victim: &mut Player,
    attack: AttackType,
    garbage_problem: Option<Problem>,
    intensity: AttackIntensity,
    now: Instant,
) -> Option<Instant> {
    match attack.debuff() {
        None => {
            if let Some(problem) = garbage_problem {
                victim.queued.push_front(problem);
            }
            None
        }
        Some(debuff_type) => {
            let base = Duration::from_secs(debuff_type.base_duration_secs());
            let scaled = base.mul_f64(intensity.multiplier());
            let ends_at = now + scaled;
            victim.active_debuff = Some(ActiveDebuff { debuff_type, ends_at });
            Some(ends_at)
        }
    }
}

/// Clears an expired debuff and starts the post-debuff grace window.
/// Grace blocks new debuffs but not `garbageDrop`.
pub fn expire_debuff_and_start_grace(victim: &mut Player, now: Instant) {
    victim.active_debuff = None;
    victim.grace_end = Some(now + Duration::from_secs(crate::models::GRACE_PERIOD_SECS));
}
