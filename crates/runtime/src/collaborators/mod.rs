//! Interfaces to the systems the engine consumes but does not own.
//!
//! Identity, roster and arena data live elsewhere; the engine reaches them
//! only through these traits. [`memory`] provides in-process implementations
//! for tests and the demo binary.

pub mod memory;

use async_trait::async_trait;

use combat_core::{
    Arena, ArenaId, CombatError, CombatMatch, CombatantStats, ErrorKind, ParticipantId, ServerId,
};

pub use memory::{
    InMemoryArenaDirectory, InMemoryRoster, ParticipantsOnly, SameWorldSpectators,
    StaticIdentityResolver,
};

/// Authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub participant: ParticipantId,
    pub server: ServerId,
    /// May use administrative operations.
    pub operator: bool,
}

impl Identity {
    pub fn player(participant: impl Into<ParticipantId>, server: impl Into<ServerId>) -> Self {
        Self {
            participant: participant.into(),
            server: server.into(),
            operator: false,
        }
    }

    pub fn operator(participant: impl Into<ParticipantId>, server: impl Into<ServerId>) -> Self {
        Self {
            operator: true,
            ..Self::player(participant, server)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("credential rejected")]
    Unauthorized,

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn participant_not_found(id: &ParticipantId) -> Self {
        Self::NotFound {
            what: "participant",
            id: id.to_string(),
        }
    }

    pub fn arena_not_found(id: &ArenaId) -> Self {
        Self::NotFound {
            what: "arena",
            id: id.to_string(),
        }
    }
}

impl CombatError for CollaboratorError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Unavailable { .. } => ErrorKind::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "identity.unauthorized",
            Self::NotFound { .. } => "collaborator.not_found",
            Self::Unavailable { .. } => "collaborator.unavailable",
        }
    }
}

/// Turns an opaque credential into an [`Identity`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<Identity, CollaboratorError>;
}

/// Contestant data owned by the game world.
#[async_trait]
pub trait Roster: Send + Sync {
    /// World the participant currently belongs to.
    async fn world_of(&self, participant: &ParticipantId) -> Result<ServerId, CollaboratorError>;

    /// Current combat stats of the participant.
    async fn stats_of(
        &self,
        participant: &ParticipantId,
    ) -> Result<CombatantStats, CollaboratorError>;
}

/// Arena lookup by slug.
#[async_trait]
pub trait ArenaDirectory: Send + Sync {
    async fn arena(&self, id: &ArenaId) -> Result<Arena, CollaboratorError>;
}

/// Decides who may watch a match's log.
pub trait AccessPolicy: Send + Sync {
    fn can_watch(&self, identity: &Identity, record: &CombatMatch) -> bool;
}
