//! Closed enums from the wire contract.
//!
//! Every enum in this module is a closed set per the protocol spec — a
//! deserialized value outside the listed variants is a decode error,
//! not something callers need to handle as an "unknown" case.

use serde::{Deserialize, Serialize};

/// Problem difficulty. Drives both score reward and attack type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Points awarded for a passing submit of a non-garbage problem of
    /// this difficulty.
    pub fn score_reward(self) -> u32 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }
}

/// What kind of problem a player is solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Code,
    Mcq,
}

/// A debuff applied to a player by an incoming attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebuffType {
    Ddos,
    Flashbang,
    VimLock,
    MemoryLeak,
}

impl DebuffType {
    /// Base duration before `attackIntensity` scaling.
    pub fn base_duration_secs(self) -> u64 {
        match self {
            DebuffType::Ddos => 12,
            DebuffType::Flashbang => 25,
            DebuffType::VimLock => 12,
            DebuffType::MemoryLeak => 30,
        }
    }
}

/// The full set of attack payloads a passing submit can produce —
/// every debuff type, plus `garbageDrop` which has no debuff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttackType {
    GarbageDrop,
    Ddos,
    Flashbang,
    VimLock,
    MemoryLeak,
}

impl From<DebuffType> for AttackType {
    fn from(d: DebuffType) -> Self {
        match d {
            DebuffType::Ddos => AttackType::Ddos,
            DebuffType::Flashbang => AttackType::Flashbang,
            DebuffType::VimLock => AttackType::VimLock,
            DebuffType::MemoryLeak => AttackType::MemoryLeak,
        }
    }
}

impl AttackType {
    /// The debuff this attack applies, or `None` for `garbageDrop`
    /// (which mutates the queue directly instead of setting a debuff).
    pub fn debuff(self) -> Option<DebuffType> {
        match self {
            AttackType::GarbageDrop => None,
            AttackType::Ddos => Some(DebuffType::Ddos),
            AttackType::Flashbang => Some(DebuffType::Flashbang),
            AttackType::VimLock => Some(DebuffType::VimLock),
            AttackType::MemoryLeak => Some(DebuffType::MemoryLeak),
        }
    }
}

/// A buff a player can purchase from the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuffType {
    RateLimiter,
}

/// A player-controlled policy for choosing attack targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TargetingMode {
    #[default]
    Random,
    Attackers,
    TopScore,
    NearDeath,
    RankAbove,
}

/// The lifecycle phase of a match within a room.
///
/// Transitions are strictly forward until `RETURN_TO_LOBBY`:
/// `Lobby -> Warmup -> Main -> Ended -> Lobby`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    Lobby,
    Warmup,
    Main,
    Ended,
}

impl MatchPhase {
    /// Whether this phase counts as "the match is actively running"
    /// for the purposes of the per-player arrival scheduler.
    pub fn is_active(self) -> bool {
        matches!(self, MatchPhase::Warmup | MatchPhase::Main)
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchEndReason {
    LastAlive,
    TimeExpired,
}

/// A participant's role in the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Player,
    Bot,
    Spectator,
}

/// A player's publicly visible status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerStatus {
    Lobby,
    Coding,
    Error,
    UnderAttack,
    Eliminated,
}

/// The difficulty profile chosen for a match, driving problem sampling
/// weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyProfile {
    Beginner,
    Moderate,
    Competitive,
}

impl DifficultyProfile {
    /// `(easy, medium, hard)` sampling weights for this profile.
    pub fn weights(self) -> (u32, u32, u32) {
        match self {
            DifficultyProfile::Beginner => (70, 25, 5),
            DifficultyProfile::Moderate => (40, 40, 20),
            DifficultyProfile::Competitive => (20, 40, 40),
        }
    }
}

/// How aggressively attacks scale debuff durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackIntensity {
    Low,
    High,
}

impl AttackIntensity {
    pub fn multiplier(self) -> f64 {
        match self {
            AttackIntensity::Low => 1.0,
            AttackIntensity::High => 1.3,
        }
    }
}

/// An item purchasable from the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShopItem {
    ClearDebuff,
    MemoryDefrag,
    SkipProblem,
    RateLimiter,
    Hint,
}

impl ShopItem {
    pub fn cost(self) -> i64 {
        match self {
            ShopItem::ClearDebuff => 10,
            ShopItem::MemoryDefrag => 10,
            ShopItem::SkipProblem => 15,
            ShopItem::RateLimiter => 10,
            ShopItem::Hint => 5,
        }
    }

    /// Cooldown after purchase, if any.
    pub fn cooldown_secs(self) -> Option<u64> {
        match self {
            ShopItem::RateLimiter => Some(60),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_score_reward() {
        assert_eq!(Difficulty::Easy.score_reward(), 5);
        assert_eq!(Difficulty::Medium.score_reward(), 10);
        assert_eq!(Difficulty::Hard.score_reward(), 20);
    }

    #[test]
    fn test_debuff_base_durations() {
        assert_eq!(DebuffType::Ddos.base_duration_secs(), 12);
        assert_eq!(DebuffType::Flashbang.base_duration_secs(), 25);
        assert_eq!(DebuffType::VimLock.base_duration_secs(), 12);
        assert_eq!(DebuffType::MemoryLeak.base_duration_secs(), 30);
    }

    #[test]
    fn test_attack_type_from_debuff_round_trips_to_debuff() {
        for d in [
            DebuffType::Ddos,
            DebuffType::Flashbang,
            DebuffType::VimLock,
            DebuffType::MemoryLeak,
        ] {
            let attack: AttackType = d.into();
            assert_eq!(attack.debuff(), Some(d));
        }
        assert_eq!(AttackType::GarbageDrop.debuff(), None);
    }

    #[test]
    fn test_difficulty_profile_weights() {
        assert_eq!(DifficultyProfile::Beginner.weights(), (70, 25, 5));
        assert_eq!(DifficultyProfile::Moderate.weights(), (40, 40, 20));
        assert_eq!(DifficultyProfile::Competitive.weights(), (20, 40, 40));
    }

    #[test]
    fn test_attack_intensity_multiplier() {
        assert_eq!(AttackIntensity::Low.multiplier(), 1.0);
        assert_eq!(AttackIntensity::High.multiplier(), 1.3);
    }

    #[test]
    fn test_shop_item_costs_and_cooldowns() {
        assert_eq!(ShopItem::ClearDebuff.cost(), 10);
        assert_eq!(ShopItem::SkipProblem.cost(), 15);
        assert_eq!(ShopItem::RateLimiter.cooldown_secs(), Some(60));
        assert_eq!(ShopItem::Hint.cooldown_secs(), None);
    }

    #[test]
    fn test_match_phase_is_active() {
        assert!(!MatchPhase::Lobby.is_active());
        assert!(MatchPhase::Warmup.is_active());
        assert!(MatchPhase::Main.is_active());
        assert!(!MatchPhase::Ended.is_active());
    }

    #[test]
    fn test_targeting_mode_default_is_random() {
        assert_eq!(TargetingMode::default(), TargetingMode::Random);
    }
}
