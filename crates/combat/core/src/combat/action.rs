//! The closed set of actions a turn can produce.

/// Kind of action recorded in a log entry.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ActionKind {
    /// Plain strike.
    Attack,
    /// Raise guard; halves the next incoming hit.
    Defense,
    /// Signature move; heavier than an attack.
    Special,
    /// Footwork; builds momentum for the next hit.
    Movement,
    /// Riposte scaled by agility.
    Counter,
    /// Steel oneself; permanent strength gain.
    Buff,
    /// Whiffed swing.
    Miss,
    /// Critical strike; double damage.
    Critical,
}

impl ActionKind {
    /// Draw order for the weighted table.
    pub const ALL: [ActionKind; 8] = [
        Self::Attack,
        Self::Defense,
        Self::Special,
        Self::Movement,
        Self::Counter,
        Self::Buff,
        Self::Miss,
        Self::Critical,
    ];

    /// Weight out of 100 in the action table.
    pub const fn weight(self) -> u32 {
        match self {
            Self::Attack => 30,
            Self::Defense => 12,
            Self::Special => 8,
            Self::Movement => 10,
            Self::Counter => 10,
            Self::Buff => 8,
            Self::Miss => 12,
            Self::Critical => 10,
        }
    }

    pub const fn deals_damage(self) -> bool {
        matches!(
            self,
            Self::Attack | Self::Special | Self::Counter | Self::Critical
        )
    }

    /// Maps a d100 roll (1-100) onto the weighted table.
    pub fn draw(roll: u32) -> ActionKind {
        let mut threshold = 0;
        for kind in Self::ALL {
            threshold += kind.weight();
            if roll <= threshold {
                return kind;
            }
        }
        Self::Critical
    }

    /// Stable index used in the canonical log encoding.
    pub const fn index(self) -> u8 {
        match self {
            Self::Attack => 0,
            Self::Defense => 1,
            Self::Special => 2,
            Self::Movement => 3,
            Self::Counter => 4,
            Self::Buff => 5,
            Self::Miss => 6,
            Self::Critical => 7,
        }
    }
}
