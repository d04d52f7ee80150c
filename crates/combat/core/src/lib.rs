//! Pure match rules shared by the arena runtime and offline tooling.
//!
//! `combat-core` owns the deterministic parts of a match: resolving an arena's
//! risk profile into a [`CombatConfig`], the two-party [`AcceptanceBook`], the
//! [`CombatMatch`] lifecycle, and the [`CombatSimulator`]. Nothing here reads
//! a clock or an unseeded RNG; callers pass timestamps and seeds in.
pub mod acceptance;
pub mod combat;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod types;

pub use acceptance::{
    Acceptance, AcceptanceBook, AcceptanceError, AcceptanceResponse, AcceptanceStatus,
    CancelReason, RespondOutcome, Resolution,
};
pub use combat::{
    ActionKind, CombatSimulator, CombatantStats, Fighter, LogEntry, PcgRng, RngOracle,
    SimulationError, SimulationOutcome, StatusEffect, compute_seed, is_gap_free, log_digest,
};
pub use config::{Arena, CombatConfig, ConfigOverride, resolve, validate};
pub use error::{CombatError, ErrorKind};
pub use lifecycle::{
    CombatMatch, ForcedCompletion, MatchStatus, MatchSummary, Transition, TransitionError,
    WinMethod,
};
pub use types::{ArenaId, MatchId, Participant, ParticipantId, ServerId, Timestamp};
