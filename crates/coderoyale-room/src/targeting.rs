//! Targeting engine: pure victim selection under a policy.
//!
//! Inputs are always pre-filtered to the eligible pool (alive, not
//! self, not spectator, not in grace) by the caller — this module only
//! decides *which* eligible candidate wins.

use coderoyale_protocol::{PlayerId, TargetingMode};
use rand::Rng;

/// An eligible attack target.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub player_id: PlayerId,
    pub score: i64,
    pub stack_size: u32,
}

/// Selects a victim for an attack under `mode`.
///
/// `ranking` is the full current score ranking (highest first) of all
/// non-spectator participants, used by `rankAbove` even when the
/// player it names isn't itself eligible right now (in which case the
/// policy falls back to `random`). `recent_attackers` is the set of
/// players who attacked `attacker_id` within the attackers-mode
/// window, already trimmed by the caller.
pub fn select_target(
    mode: TargetingMode,
    candidates: &[Candidate],
    ranking: &[PlayerId],
    attacker_id: PlayerId,
    recent_attackers: &[PlayerId],
    stack_limit: u32,
    rng: &mut impl Rng,
) -> Option<PlayerId> {
    if candidates.is_empty() {
        return None;
    }

    match mode {
        TargetingMode::Random => uniform_pick(candidates, rng),
        TargetingMode::TopScore => {
            let max = candidates.iter().map(|c| c.score).max().unwrap();
            let tied: Vec<_> = candidates.iter().filter(|c| c.score == max).copied().collect();
            uniform_pick(&tied, rng)
        }
        TargetingMode::NearDeath => {
            let ratio = |c: &Candidate| c.stack_size as f64 / stack_limit.max(1) as f64;
            let max_ratio = candidates
                .iter()
                .map(ratio)
                .fold(f64::NEG_INFINITY, f64::max);
            let tied: Vec<_> = candidates
                .iter()
                .filter(|c| (ratio(c) - max_ratio).abs() < f64::EPSILON)
                .copied()
                .collect();
            uniform_pick(&tied, rng)
        }
        TargetingMode::Attackers => {
            let eligible_attackers: Vec<Candidate> = candidates
                .iter()
                .filter(|c| recent_attackers.contains(&c.player_id))
                .copied()
                .collect();
            if eligible_attackers.is_empty() {
                uniform_pick(candidates, rng)
            } else {
                uniform_pick(&eligible_attackers, rng)
            }
        }
        TargetingMode::RankAbove => {
            let above = player_immediately_above(ranking, attacker_id);
            match above.and_then(|id| candidates.iter().find(|c| c.player_id == id)) {
                Some(c) => Some(c.player_id),
                None => uniform_pick(candidates, rng),
            }
        }
    }
}

fn uniform_pick(candidates: &[Candidate], rng: &mut impl Rng) -> Option<PlayerId> {
    if candidates.is_empty() {
        return None;
    }
    let idx = rng.random_range(0..candidates.len());
    Some(candidates[idx].player_id)
}

fn player_immediately_above(ranking: &[PlayerId], attacker_id: PlayerId) -> Option<PlayerId> {
    let pos = ranking.iter().position(|id| *id == attacker_id)?;
    if pos == 0 {
        None
    } else {
        ranking.get(pos - 1).copied()
    }
}
