//! Append-only combat log entries.

use sha2::{Digest, Sha256};

use super::action::ActionKind;
use crate::types::ParticipantId;

/// Status effect produced by an injury or death roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StatusEffect {
    /// Strength lost by the target.
    Injury { penalty: u32 },
    Death,
}

/// One immutable entry of a match's log.
///
/// Action entries carry the damage dealt. Status-effect entries repeat the
/// action kind that triggered them, deal no damage and carry `effect`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Gap-free, starting at 0.
    pub sequence: u32,
    /// Turn that produced this entry.
    pub turn: u32,
    /// Simulated offset from fight start at which observers see the entry.
    pub offset_ms: u64,
    pub actor_id: ParticipantId,
    pub target_id: ParticipantId,
    pub action_kind: ActionKind,
    pub damage: u32,
    pub effect: Option<StatusEffect>,
    /// Target health after this entry was applied.
    pub health_after: u32,
    pub narration: String,
}

impl LogEntry {
    /// Checks the per-variant field rules.
    pub fn is_well_formed(&self) -> bool {
        match self.effect {
            Some(_) => self.damage == 0,
            None => self.action_kind.deals_damage() || self.damage == 0,
        }
    }

    pub fn is_status_effect(&self) -> bool {
        self.effect.is_some()
    }

    /// Feeds a canonical, length-prefixed encoding into `hasher`.
    fn write_canonical(&self, hasher: &mut Sha256) {
        hasher.update(self.sequence.to_le_bytes());
        hasher.update(self.turn.to_le_bytes());
        hasher.update(self.offset_ms.to_le_bytes());
        write_str(hasher, self.actor_id.as_str());
        write_str(hasher, self.target_id.as_str());
        hasher.update([self.action_kind.index()]);
        hasher.update(self.damage.to_le_bytes());
        match self.effect {
            None => hasher.update([0u8]),
            Some(StatusEffect::Injury { penalty }) => {
                hasher.update([1u8]);
                hasher.update(penalty.to_le_bytes());
            }
            Some(StatusEffect::Death) => hasher.update([2u8]),
        }
        hasher.update(self.health_after.to_le_bytes());
        write_str(hasher, &self.narration);
    }
}

fn write_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// SHA-256 over the ordered log. Equal digests mean byte-identical logs.
pub fn log_digest(entries: &[LogEntry]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((entries.len() as u64).to_le_bytes());
    for entry in entries {
        entry.write_canonical(&mut hasher);
    }
    hasher.finalize().into()
}

/// Returns true if sequences start at 0 and increase by exactly one.
pub fn is_gap_free(entries: &[LogEntry]) -> bool {
    entries
        .iter()
        .enumerate()
        .all(|(index, entry)| entry.sequence as usize == index)
}
