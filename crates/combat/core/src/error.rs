//! Common error infrastructure for combat-core.
//!
//! Domain-specific errors (`AcceptanceError`, `TransitionError`,
//! `SimulationError`) live next to the rules they enforce. This module only
//! provides the shared classification every layer maps onto.
//!
//! # Design Principles
//!
//! - **Type Safety**: each rule family has its own error enum
//! - **Classification**: every error reports an [`ErrorKind`] so transports
//!   can map it onto a status code without matching on variants
//! - **No panics**: guard violations are values, never asserts

/// Caller-facing classification of a failure.
///
/// The kinds mirror how a client should react:
/// - **Unauthorized**: identity could not be established
/// - **NotFound**: unknown match or arena, stop retrying
/// - **Forbidden**: authenticated but not allowed for this match
/// - **InvalidArgument**: malformed request
/// - **Conflict**: a state-machine guard was violated
/// - **Integrity**: participants span inconsistent worlds
/// - **Internal**: unexpected failure inside the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    Forbidden,
    InvalidArgument,
    Conflict,
    Integrity,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Integrity => "integrity",
            Self::Internal => "internal",
        }
    }

    /// Only internal failures may succeed on a retry.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal)
    }

    /// Kinds that indicate a bug or inconsistent upstream data.
    pub const fn is_alarming(&self) -> bool {
        matches!(self, Self::Integrity | Self::Internal)
    }
}

/// Common trait for all classified errors in the workspace.
pub trait CombatError: std::fmt::Display + std::fmt::Debug {
    /// Returns the caller-facing classification.
    fn kind(&self) -> ErrorKind;

    /// Returns a stable identifier for this variant (metrics, tests).
    fn error_code(&self) -> &'static str {
        self.kind().as_str()
    }
}
