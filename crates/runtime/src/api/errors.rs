//! Unified error type surfaced by the engine API.
//!
//! Wraps failures from the match rules, repositories, broadcasters and
//! collaborators so callers can map every failure through one
//! [`ErrorKind`] taxonomy.

use thiserror::Error;

use combat_core::{
    AcceptanceError, ArenaId, CombatError, ErrorKind, MatchId, MatchStatus, ParticipantId,
    ServerId, SimulationError, TransitionError,
};

use crate::broadcast::BroadcastError;
use crate::collaborators::CollaboratorError;
pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} not found")]
    MatchNotFound(MatchId),

    #[error("arena {0} not found")]
    ArenaNotFound(ArenaId),

    #[error("{participant} may not access {match_id}")]
    Forbidden {
        match_id: MatchId,
        participant: ParticipantId,
    },

    #[error("{participant} is on {caller}, but {match_id} is hosted on {hosted}")]
    ServerMismatch {
        match_id: MatchId,
        participant: ParticipantId,
        caller: ServerId,
        hosted: ServerId,
    },

    #[error("{match_id} is {status}; operation requires {required}")]
    WrongStatus {
        match_id: MatchId,
        status: MatchStatus,
        required: &'static str,
    },

    #[error("{operation} requires operator privileges")]
    OperatorOnly { operation: &'static str },

    #[error("engine requires a {name}")]
    MissingCollaborator { name: &'static str },

    #[error(transparent)]
    Acceptance(#[from] AcceptanceError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("match worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        CombatError::kind(self)
    }
}

impl CombatError for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::MatchNotFound(_) | Self::ArenaNotFound(_) => ErrorKind::NotFound,
            Self::Forbidden { .. } | Self::OperatorOnly { .. } => ErrorKind::Forbidden,
            Self::ServerMismatch { .. } => ErrorKind::Integrity,
            Self::WrongStatus { .. } => ErrorKind::Conflict,
            Self::MissingCollaborator { .. } => ErrorKind::Internal,
            Self::Acceptance(e) => e.kind(),
            Self::Transition(e) => e.kind(),
            Self::Simulation(e) => e.kind(),
            Self::Broadcast(e) => e.kind(),
            Self::Repository(e) => e.kind(),
            Self::Collaborator(e) => e.kind(),
            Self::WorkerJoin(_) => ErrorKind::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::MatchNotFound(_) => "engine.match_not_found",
            Self::ArenaNotFound(_) => "engine.arena_not_found",
            Self::Forbidden { .. } => "engine.forbidden",
            Self::ServerMismatch { .. } => "engine.server_mismatch",
            Self::WrongStatus { .. } => "engine.wrong_status",
            Self::OperatorOnly { .. } => "engine.operator_only",
            Self::MissingCollaborator { .. } => "engine.missing_collaborator",
            Self::Acceptance(e) => e.error_code(),
            Self::Transition(e) => e.error_code(),
            Self::Simulation(e) => e.error_code(),
            Self::Broadcast(e) => e.error_code(),
            Self::Repository(e) => e.error_code(),
            Self::Collaborator(e) => e.error_code(),
            Self::WorkerJoin(_) => "engine.worker_join",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::{AcceptanceResponse, CancelReason, Resolution};

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(EngineError::MatchNotFound(MatchId(1)).kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::from(CollaboratorError::Unauthorized).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            EngineError::from(AcceptanceError::AlreadyResolved {
                resolution: Resolution::Cancel(CancelReason::Timeout),
                response: AcceptanceResponse::Accept,
            })
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::from(RepositoryError::LockPoisoned).kind(),
            ErrorKind::Internal
        );
        assert!(EngineError::from(RepositoryError::LockPoisoned).kind().is_retryable());
    }

    #[test]
    fn codes_are_delegated() {
        let err = EngineError::from(TransitionError::ServerMismatch {
            first: "gaul".into(),
            second: "egypt".into(),
        });
        assert_eq!(err.error_code(), "transition.server_mismatch");
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }
}
