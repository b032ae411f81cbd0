//! Match settings: host-editable knobs, valid only in the lobby.

use serde::{Deserialize, Serialize};

use crate::enums::{AttackIntensity, DifficultyProfile};

pub const MATCH_DURATION_SEC_RANGE: std::ops::RangeInclusive<u32> = 3..=600;
pub const PLAYER_CAP_RANGE: std::ops::RangeInclusive<u32> = 2..=99;
pub const STACK_LIMIT_RANGE: std::ops::RangeInclusive<u32> = 5..=20;
pub const STARTING_QUEUED_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettings {
    pub match_duration_sec: u32,
    pub player_cap: u32,
    pub stack_limit: u32,
    pub starting_queued: u32,
    pub difficulty_profile: DifficultyProfile,
    pub attack_intensity: AttackIntensity,
}

impl Default for RoomSettings {
    fn default() -> Self {
        RoomSettings {
            match_duration_sec: 300,
            player_cap: 20,
            stack_limit: 10,
            starting_queued: 2,
            difficulty_profile: DifficultyProfile::Moderate,
            attack_intensity: AttackIntensity::Low,
        }
    }
}

impl RoomSettings {
    /// Clamps every field into its valid range. Used both when
    /// constructing initial settings and when merging an
    /// `UPDATE_SETTINGS` patch, so an out-of-range request degrades to
    /// the nearest valid value instead of being rejected outright.
    pub fn clamped(mut self) -> Self {
        self.match_duration_sec = self
            .match_duration_sec
            .clamp(*MATCH_DURATION_SEC_RANGE.start(), *MATCH_DURATION_SEC_RANGE.end());
        self.player_cap = self.player_cap.clamp(*PLAYER_CAP_RANGE.start(), *PLAYER_CAP_RANGE.end());
        self.stack_limit = self.stack_limit.clamp(*STACK_LIMIT_RANGE.start(), *STACK_LIMIT_RANGE.end());
        self.starting_queued = self
            .starting_queued
            .clamp(*STARTING_QUEUED_RANGE.start(), *STARTING_QUEUED_RANGE.end());
        self
    }

    /// Applies a partial patch, clamping the result. Fields absent
    /// from the patch keep their current value.
    pub fn merge_patch(self, patch: &crate::commands::SettingsPatch) -> Self {
        RoomSettings {
            match_duration_sec: patch.match_duration_sec.unwrap_or(self.match_duration_sec),
            player_cap: patch.player_cap.unwrap_or(self.player_cap),
            stack_limit: patch.stack_limit.unwrap_or(self.stack_limit),
            starting_queued: patch.starting_queued.unwrap_or(self.starting_queued),
            difficulty_profile: patch.difficulty_profile.unwrap_or(self.difficulty_profile),
            attack_intensity: patch.attack_intensity.unwrap_or(self.attack_intensity),
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::SettingsPatch;

    #[test]
    fn test_default_settings_are_already_in_range() {
        let s = RoomSettings::default();
        assert_eq!(s, s.clamped());
    }

    #[test]
    fn test_clamped_rejects_out_of_range_values() {
        let s = RoomSettings {
            match_duration_sec: 1,
            player_cap: 1000,
            stack_limit: 1,
            starting_queued: 99,
            ..RoomSettings::default()
        }
        .clamped();
        assert_eq!(s.match_duration_sec, 3);
        assert_eq!(s.player_cap, 99);
        assert_eq!(s.stack_limit, 5);
        assert_eq!(s.starting_queued, 5);
    }

    #[test]
    fn test_merge_patch_only_touches_named_fields() {
        let base = RoomSettings::default();
        let patch = SettingsPatch {
            match_duration_sec: Some(120),
            ..Default::default()
        };
        let merged = base.merge_patch(&patch);
        assert_eq!(merged.match_duration_sec, 120);
        assert_eq!(merged.player_cap, base.player_cap);
    }
}
