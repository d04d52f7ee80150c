//! Arena risk profiles and the bounded combat configuration derived from them.
//!
//! Resolution is pure and total: any input, including adversarial admin
//! overrides, is clamped into bounds instead of rejected. The bounds cap the
//! simulation cost (at most [`CombatConfig::MAX_ACTIONS_CEILING`] turns) and the
//! per-roll risk (at most 100%).

use crate::types::ArenaId;

/// Immutable per-match combat parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatConfig {
    pub max_actions: u32,
    pub action_interval_seconds: u32,
    pub death_chance_percent: u8,
    pub injury_chance_percent: u8,
}

impl CombatConfig {
    // ===== bounds =====
    pub const MAX_ACTIONS_FLOOR: u32 = 5;
    pub const MAX_ACTIONS_CEILING: u32 = 50;
    pub const INTERVAL_FLOOR_SECS: u32 = 2;
    pub const INTERVAL_CEILING_SECS: u32 = 10;
    pub const PERCENT_CEILING: u8 = 100;

    // ===== base profiles =====
    /// Profile for arenas where nobody can die.
    pub const SAFE: Self = Self {
        max_actions: 20,
        action_interval_seconds: 4,
        death_chance_percent: 0,
        injury_chance_percent: 15,
    };

    /// Profile for arenas with death enabled.
    pub const LETHAL: Self = Self {
        max_actions: 20,
        action_interval_seconds: 4,
        death_chance_percent: 8,
        injury_chance_percent: 30,
    };

    /// Base profile for the given risk flag.
    pub const fn base(death_enabled: bool) -> Self {
        if death_enabled { Self::LETHAL } else { Self::SAFE }
    }

    /// Returns true if every field lies within its documented bounds.
    pub fn is_within_bounds(&self) -> bool {
        (Self::MAX_ACTIONS_FLOOR..=Self::MAX_ACTIONS_CEILING).contains(&self.max_actions)
            && (Self::INTERVAL_FLOOR_SECS..=Self::INTERVAL_CEILING_SECS)
                .contains(&self.action_interval_seconds)
            && self.death_chance_percent <= Self::PERCENT_CEILING
            && self.injury_chance_percent <= Self::PERCENT_CEILING
    }

    /// Pacing interval in milliseconds.
    pub const fn action_interval_millis(&self) -> u64 {
        self.action_interval_seconds as u64 * 1_000
    }

    pub const fn death_possible(&self) -> bool {
        self.death_chance_percent > 0
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::SAFE
    }
}

/// Partial, unvalidated configuration, typically an admin override.
///
/// Fields are wide signed integers so that negative or oversized values can
/// be expressed and then clamped by [`validate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfigOverride {
    pub max_actions: Option<i64>,
    pub action_interval_seconds: Option<i64>,
    pub death_chance_percent: Option<i64>,
    pub injury_chance_percent: Option<i64>,
}

impl ConfigOverride {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Venue configuration consumed by the resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Arena {
    pub id: ArenaId,
    pub name: String,
    pub death_enabled: bool,
    /// Admin tuning merged over the base profile.
    pub overrides: ConfigOverride,
}

impl Arena {
    pub fn new(id: impl Into<ArenaId>, name: impl Into<String>, death_enabled: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            death_enabled,
            overrides: ConfigOverride::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigOverride) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Maps an arena's risk profile to its combat configuration.
///
/// Death-disabled arenas always resolve to a zero death chance; death-enabled
/// arenas always resolve to at least 1%, whatever the overrides say.
pub fn resolve(arena: &Arena) -> CombatConfig {
    let mut config = merge(CombatConfig::base(arena.death_enabled), &arena.overrides);

    config.death_chance_percent = if arena.death_enabled {
        config.death_chance_percent.max(1)
    } else {
        0
    };

    config
}

/// Clamps a partial configuration into bounds, filling gaps from the safe profile.
pub fn validate(partial: &ConfigOverride) -> CombatConfig {
    merge(CombatConfig::SAFE, partial)
}

fn merge(base: CombatConfig, partial: &ConfigOverride) -> CombatConfig {
    CombatConfig {
        max_actions: clamp_u32(
            partial.max_actions,
            base.max_actions,
            CombatConfig::MAX_ACTIONS_FLOOR,
            CombatConfig::MAX_ACTIONS_CEILING,
        ),
        action_interval_seconds: clamp_u32(
            partial.action_interval_seconds,
            base.action_interval_seconds,
            CombatConfig::INTERVAL_FLOOR_SECS,
            CombatConfig::INTERVAL_CEILING_SECS,
        ),
        death_chance_percent: clamp_percent(
            partial.death_chance_percent,
            base.death_chance_percent,
        ),
        injury_chance_percent: clamp_percent(
            partial.injury_chance_percent,
            base.injury_chance_percent,
        ),
    }
}

fn clamp_u32(value: Option<i64>, fallback: u32, min: u32, max: u32) -> u32 {
    let value = value.unwrap_or(fallback as i64);
    value.clamp(min as i64, max as i64) as u32
}

fn clamp_percent(value: Option<i64>, fallback: u8) -> u8 {
    let value = value.unwrap_or(fallback as i64);
    value.clamp(0, CombatConfig::PERCENT_CEILING as i64) as u8
}
