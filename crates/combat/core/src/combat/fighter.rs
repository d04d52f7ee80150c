//! Combatant stats consumed by the simulation.

use crate::types::ParticipantId;

/// Initial stats of one combatant, snapshotted when the match starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatantStats {
    pub health: u32,
    pub strength: u32,
    pub defense: u32,
    pub agility: u32,
}

impl CombatantStats {
    pub const fn new(health: u32, strength: u32, defense: u32, agility: u32) -> Self {
        Self {
            health,
            strength,
            defense,
            agility,
        }
    }
}

impl Default for CombatantStats {
    fn default() -> Self {
        Self::new(100, 12, 6, 10)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fighter {
    pub id: ParticipantId,
    pub stats: CombatantStats,
}

impl Fighter {
    pub fn new(id: impl Into<ParticipantId>, stats: CombatantStats) -> Self {
        Self {
            id: id.into(),
            stats,
        }
    }
}

/// Mutable per-fight state derived from a [`Fighter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FighterState {
    pub health: u32,
    pub strength: u32,
    pub defense: u32,
    pub agility: u32,
    /// Halves the next incoming hit.
    pub guarded: bool,
    /// Bonus added to this fighter's next damaging action.
    pub momentum: u32,
}

impl FighterState {
    /// Strength never drops below this floor from injuries.
    pub const MIN_STRENGTH: u32 = 1;

    pub fn from_stats(stats: &CombatantStats) -> Self {
        Self {
            health: stats.health,
            strength: stats.strength.max(Self::MIN_STRENGTH),
            defense: stats.defense,
            agility: stats.agility,
            guarded: false,
            momentum: 0,
        }
    }

    pub fn is_down(&self) -> bool {
        self.health == 0
    }
}
