//! Deterministic fight simulation.
pub mod action;
pub mod fighter;
pub mod log;
pub mod rng;
pub mod simulator;

pub use action::ActionKind;
pub use fighter::{CombatantStats, Fighter};
pub use log::{LogEntry, StatusEffect, is_gap_free, log_digest};
pub use rng::{PcgRng, RngOracle, compute_seed};
pub use simulator::{CombatSimulator, SimulationError, SimulationOutcome};
