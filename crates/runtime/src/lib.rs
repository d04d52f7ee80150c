//! Async orchestration for combat matches.
//!
//! This crate runs the pure rules from `combat-core` inside tokio tasks: one
//! acceptance coordinator per pending match, one worker per match that
//! simulates and paces the log, and a broadcaster per match that fans the log
//! out to watchers. Consumers build a [`CombatEngine`] and talk to it
//! directly or through the credential-checked [`Gateway`].
//!
//! Modules are organized by responsibility:
//! - [`engine`] hosts the façade and its builder
//! - [`api`] exposes the error type and gateway
//! - [`broadcast`] provides per-match log fan-out and subscriptions
//! - [`collaborators`] defines the identity, roster and arena interfaces
//! - [`repository`] persists match records and logs
//! - `workers` keeps the per-match tasks internal to the crate
pub mod api;
pub mod broadcast;
pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod repository;

mod workers;

pub use api::{EngineError, Gateway, Result};
pub use broadcast::{BroadcastError, LogBroadcaster, LogStream, Subscription};
pub use clock::MatchClock;
pub use collaborators::{
    AccessPolicy, ArenaDirectory, CollaboratorError, Identity, IdentityResolver,
    InMemoryArenaDirectory, InMemoryRoster, ParticipantsOnly, Roster, SameWorldSpectators,
    StaticIdentityResolver,
};
pub use config::EngineConfig;
pub use engine::{AuditReport, CombatEngine, EngineBuilder};
pub use repository::{
    FileLogRepository, FileMatchRepository, InMemoryLogRepository, InMemoryMatchRepository,
    LogRepository, MatchRepository, RepositoryError,
};
