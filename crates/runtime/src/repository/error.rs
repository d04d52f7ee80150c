//! Error types raised by repository implementations.

use combat_core::{CombatError, ErrorKind, MatchId};
use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository lock was poisoned")]
    LockPoisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("log for {match_id} expected sequence {expected}, got {found}")]
    SequenceGap {
        match_id: MatchId,
        expected: u32,
        found: u32,
    },
}

impl CombatError for RepositoryError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::LockPoisoned => "repository.lock_poisoned",
            Self::Io(_) => "repository.io",
            Self::Serialization(_) => "repository.serialization",
            Self::Json(_) => "repository.json",
            Self::CorruptedData(_) => "repository.corrupted",
            Self::SequenceGap { .. } => "repository.sequence_gap",
        }
    }
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
