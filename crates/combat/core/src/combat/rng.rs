//! Deterministic random rolls for the combat simulation.
//!
//! Every roll is a pure function of a seed. The simulation derives one seed per
//! roll with [`compute_seed`], so the same match seed always replays the same
//! fight and no roll depends on how many rolls came before it.

/// Deterministic random number source.
///
/// Implementations must produce the same value for the same seed.
pub trait RngOracle: Send + Sync {
    /// Generate a random u32 value from a seed.
    fn next_u32(&self, seed: u64) -> u32;

    /// Roll a d100 (1-100 inclusive).
    fn roll_d100(&self, seed: u64) -> u32 {
        (self.next_u32(seed) % 100) + 1
    }

    /// Generate a random value in range [min, max] inclusive.
    fn range(&self, seed: u64, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        let span = u64::from(max - min) + 1;
        min + (u64::from(self.next_u32(seed)) % span) as u32
    }

    /// Succeeds with `percent` chance (0 never, 100 always).
    fn chance(&self, seed: u64, percent: u8) -> bool {
        percent > 0 && self.roll_d100(seed) <= percent as u32
    }
}

/// PCG-XSH-RR generator: 64-bit state, 32-bit output.
///
/// Stateless here: each call performs a single LCG step from the given seed
/// followed by the xorshift/rotate output permutation.
#[derive(Clone, Copy, Debug, Default)]
pub struct PcgRng;

impl PcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    #[inline]
    fn step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl RngOracle for PcgRng {
    fn next_u32(&self, seed: u64) -> u32 {
        Self::output(Self::step(seed))
    }
}

/// Roll contexts. Distinct values keep independent rolls in the same turn
/// from sharing a seed.
pub mod context {
    pub const INITIATIVE: u32 = 0;
    pub const ACTION: u32 = 1;
    pub const DAMAGE: u32 = 2;
    pub const INJURY: u32 = 3;
    pub const DEATH: u32 = 4;
}

/// Mixes the match seed with the turn, acting side and roll context.
pub fn compute_seed(match_seed: u64, turn: u32, actor_index: u32, context: u32) -> u64 {
    // SplitMix64 / FxHash style multipliers
    let mut hash = match_seed;
    hash ^= (turn as u64).wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= (actor_index as u64).wrapping_mul(0x517cc1b727220a95);
    hash ^= (context as u64).wrapping_mul(0x85ebca6b);

    // Final avalanche
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;

    hash
}
