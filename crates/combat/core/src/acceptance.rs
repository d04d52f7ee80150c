//! Pending-acceptance handshake for a matched pair.
//!
//! [`AcceptanceBook`] is the pure state the runtime's coordinator task owns.
//! It aggregates two independent per-participant responses and a deadline into
//! a single [`Resolution`]. The first definitive resolution is final: no later
//! response or timer can change it.
//!
//! Late responses follow these rules, in order:
//! 1. a non-participant is rejected as invalid input
//! 2. an elapsed deadline fires the timeout cancel before anything else
//! 3. a participant who already responded gets their prior status back
//! 4. once resolved, a decline against a cancel is a no-op; anything else is a
//!    conflict
//! 5. otherwise the response is recorded and the book re-aggregates

use crate::error::{CombatError, ErrorKind};
use crate::types::{ParticipantId, Timestamp};

/// Per-participant acceptance status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum AcceptanceStatus {
    Pending,
    Accepted,
    Declined,
}

/// A participant's answer to a pairing.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AcceptanceResponse {
    Accept,
    Decline,
}

impl AcceptanceResponse {
    const fn status(self) -> AcceptanceStatus {
        match self {
            Self::Accept => AcceptanceStatus::Accepted,
            Self::Decline => AcceptanceStatus::Declined,
        }
    }
}

/// One participant's acceptance record. Immutable once `responded_at` is set.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Acceptance {
    pub participant: ParticipantId,
    pub status: AcceptanceStatus,
    pub created_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

impl Acceptance {
    fn pending(participant: ParticipantId, created_at: Timestamp) -> Self {
        Self {
            participant,
            status: AcceptanceStatus::Pending,
            created_at,
            responded_at: None,
        }
    }

    pub fn has_responded(&self) -> bool {
        self.responded_at.is_some()
    }
}

/// Why a match was cancelled before it started.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CancelReason {
    /// A participant declined.
    Declined { by: ParticipantId },
    /// The acceptance window elapsed with a participant still pending.
    Timeout,
    /// Participants no longer resolved to the same world when the match was
    /// about to start.
    ServerMismatch,
}

impl CancelReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Declined { .. } => "declined",
            Self::Timeout => "timeout",
            Self::ServerMismatch => "server_mismatch",
        }
    }
}

/// Match-level outcome of the handshake.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    Proceed,
    Cancel(CancelReason),
}

impl Resolution {
    pub const fn is_proceed(&self) -> bool {
        matches!(self, Self::Proceed)
    }

    pub const fn is_cancel(&self) -> bool {
        matches!(self, Self::Cancel(_))
    }
}

/// Result of a successfully processed response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RespondOutcome {
    /// The responding participant's recorded status.
    pub status: AcceptanceStatus,
    /// The book's resolution after processing, if any.
    pub resolution: Option<Resolution>,
    /// False when the response was an idempotent no-op.
    pub recorded: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AcceptanceError {
    #[error("{participant} is not a participant of this match")]
    NotParticipant { participant: ParticipantId },

    #[error("acceptance already resolved as {resolution:?}; {response} is no longer accepted")]
    AlreadyResolved {
        resolution: Resolution,
        response: AcceptanceResponse,
    },
}

impl CombatError for AcceptanceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotParticipant { .. } => ErrorKind::InvalidArgument,
            Self::AlreadyResolved { .. } => ErrorKind::Conflict,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotParticipant { .. } => "acceptance.not_participant",
            Self::AlreadyResolved { .. } => "acceptance.already_resolved",
        }
    }
}

/// Acceptance state for one matched pair.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AcceptanceBook {
    acceptances: [Acceptance; 2],
    deadline: Timestamp,
    resolution: Option<Resolution>,
    resolved_at: Option<Timestamp>,
}

impl AcceptanceBook {
    pub fn new(
        first: ParticipantId,
        second: ParticipantId,
        created_at: Timestamp,
        deadline: Timestamp,
    ) -> Self {
        Self {
            acceptances: [
                Acceptance::pending(first, created_at),
                Acceptance::pending(second, created_at),
            ],
            deadline,
            resolution: None,
            resolved_at: None,
        }
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn resolved_at(&self) -> Option<Timestamp> {
        self.resolved_at
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn acceptances(&self) -> &[Acceptance; 2] {
        &self.acceptances
    }

    pub fn acceptance(&self, participant: &ParticipantId) -> Option<&Acceptance> {
        self.acceptances
            .iter()
            .find(|acceptance| &acceptance.participant == participant)
    }

    /// Fires the timeout cancel if the deadline has passed.
    ///
    /// Returns the resolution only when this call produced it. A book that is
    /// already resolved (including by a proceed) is left untouched.
    pub fn expire(&mut self, now: Timestamp) -> Option<Resolution> {
        if self.resolution.is_some() || now < self.deadline {
            return None;
        }

        let resolution = Resolution::Cancel(CancelReason::Timeout);
        self.resolve(resolution.clone(), now);
        Some(resolution)
    }

    /// Processes one participant response at `now`.
    pub fn respond(
        &mut self,
        participant: &ParticipantId,
        response: AcceptanceResponse,
        now: Timestamp,
    ) -> Result<RespondOutcome, AcceptanceError> {
        let index = self.index_of(participant).ok_or_else(|| {
            AcceptanceError::NotParticipant {
                participant: participant.clone(),
            }
        })?;

        // A response arriving at the deadline loses to the timer.
        self.expire(now);

        if self.acceptances[index].has_responded() {
            return Ok(self.outcome(index, false));
        }

        if let Some(resolution) = &self.resolution {
            return match (resolution, response) {
                (Resolution::Cancel(_), AcceptanceResponse::Decline) => {
                    Ok(self.outcome(index, false))
                }
                _ => Err(AcceptanceError::AlreadyResolved {
                    resolution: resolution.clone(),
                    response,
                }),
            };
        }

        let acceptance = &mut self.acceptances[index];
        acceptance.status = response.status();
        acceptance.responded_at = Some(now);

        self.aggregate(now);
        Ok(self.outcome(index, true))
    }

    fn aggregate(&mut self, now: Timestamp) {
        if let Some(declined) = self
            .acceptances
            .iter()
            .find(|acceptance| acceptance.status == AcceptanceStatus::Declined)
        {
            let by = declined.participant.clone();
            self.resolve(Resolution::Cancel(CancelReason::Declined { by }), now);
        } else if self
            .acceptances
            .iter()
            .all(|acceptance| acceptance.status == AcceptanceStatus::Accepted)
        {
            self.resolve(Resolution::Proceed, now);
        }
    }

    fn resolve(&mut self, resolution: Resolution, now: Timestamp) {
        debug_assert!(self.resolution.is_none(), "resolution is final");
        self.resolution = Some(resolution);
        self.resolved_at = Some(now);
    }

    fn index_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.acceptances
            .iter()
            .position(|acceptance| &acceptance.participant == participant)
    }

    fn outcome(&self, index: usize, recorded: bool) -> RespondOutcome {
        RespondOutcome {
            status: self.acceptances[index].status,
            resolution: self.resolution.clone(),
            recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Timestamp = Timestamp(60_000);

    fn book() -> AcceptanceBook {
        AcceptanceBook::new("alpha".into(), "beta".into(), Timestamp(0), DEADLINE)
    }

    fn alpha() -> ParticipantId {
        "alpha".into()
    }

    fn beta() -> ParticipantId {
        "beta".into()
    }

    #[test]
    fn both_accept_before_deadline_proceeds() {
        let mut book = book();

        let first = book
            .respond(&alpha(), AcceptanceResponse::Accept, Timestamp(10))
            .unwrap();
        assert!(first.recorded);
        assert_eq!(first.resolution, None);

        let second = book
            .respond(&beta(), AcceptanceResponse::Accept, Timestamp(20))
            .unwrap();
        assert_eq!(second.resolution, Some(Resolution::Proceed));
        assert_eq!(book.resolved_at(), Some(Timestamp(20)));
    }

    #[test]
    fn any_decline_cancels_immediately() {
        let mut book = book();
        let outcome = book
            .respond(&beta(), AcceptanceResponse::Decline, Timestamp(5))
            .unwrap();

        assert_eq!(
            outcome.resolution,
            Some(Resolution::Cancel(CancelReason::Declined { by: beta() }))
        );

        // The other side can no longer accept.
        let err = book
            .respond(&alpha(), AcceptanceResponse::Accept, Timestamp(6))
            .unwrap_err();
        assert!(matches!(err, AcceptanceError::AlreadyResolved { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn deadline_without_responses_times_out() {
        let mut book = book();
        assert_eq!(book.expire(Timestamp(59_999)), None);
        assert_eq!(
            book.expire(DEADLINE),
            Some(Resolution::Cancel(CancelReason::Timeout))
        );
        // Firing again is a no-op.
        assert_eq!(book.expire(Timestamp(70_000)), None);
    }

    #[test]
    fn late_accept_after_timeout_is_rejected() {
        let mut book = book();
        book.respond(&alpha(), AcceptanceResponse::Accept, Timestamp(100))
            .unwrap();
        book.expire(DEADLINE);

        let err = book
            .respond(&beta(), AcceptanceResponse::Accept, Timestamp(61_000))
            .unwrap_err();
        assert_eq!(
            err,
            AcceptanceError::AlreadyResolved {
                resolution: Resolution::Cancel(CancelReason::Timeout),
                response: AcceptanceResponse::Accept,
            }
        );
    }

    #[test]
    fn late_decline_after_timeout_is_noop() {
        let mut book = book();
        book.expire(DEADLINE);

        let outcome = book
            .respond(&beta(), AcceptanceResponse::Decline, Timestamp(61_000))
            .unwrap();
        assert!(!outcome.recorded);
        assert_eq!(outcome.status, AcceptanceStatus::Pending);
        assert_eq!(
            outcome.resolution,
            Some(Resolution::Cancel(CancelReason::Timeout))
        );
    }

    #[test]
    fn response_at_the_deadline_loses_to_the_timer() {
        let mut book = book();
        book.respond(&alpha(), AcceptanceResponse::Accept, Timestamp(1))
            .unwrap();

        let err = book
            .respond(&beta(), AcceptanceResponse::Accept, DEADLINE)
            .unwrap_err();
        assert!(matches!(
            err,
            AcceptanceError::AlreadyResolved {
                resolution: Resolution::Cancel(CancelReason::Timeout),
                ..
            }
        ));
    }

    #[test]
    fn repeat_response_returns_prior_result() {
        let mut book = book();
        book.respond(&alpha(), AcceptanceResponse::Accept, Timestamp(1))
            .unwrap();

        let repeat = book
            .respond(&alpha(), AcceptanceResponse::Decline, Timestamp(2))
            .unwrap();
        assert!(!repeat.recorded);
        assert_eq!(repeat.status, AcceptanceStatus::Accepted);
        assert_eq!(repeat.resolution, None);
        assert_eq!(
            book.acceptance(&alpha()).unwrap().responded_at,
            Some(Timestamp(1))
        );
    }

    #[test]
    fn proceed_is_final_against_the_timer() {
        let mut book = book();
        book.respond(&alpha(), AcceptanceResponse::Accept, Timestamp(1))
            .unwrap();
        book.respond(&beta(), AcceptanceResponse::Accept, Timestamp(2))
            .unwrap();

        assert_eq!(book.expire(Timestamp(120_000)), None);
        assert_eq!(book.resolution(), Some(&Resolution::Proceed));
    }

    #[test]
    fn non_participant_is_invalid_input() {
        let mut book = book();
        let err = book
            .respond(&"mallory".into(), AcceptanceResponse::Accept, Timestamp(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!book.is_resolved());
    }

    #[test]
    fn every_sequence_resolves_exactly_once() {
        use AcceptanceResponse::{Accept, Decline};

        let responses = [None, Some(Accept), Some(Decline)];
        for a in responses {
            for b in responses {
                let mut book = book();
                if let Some(response) = a {
                    let _ = book.respond(&alpha(), response, Timestamp(10));
                }
                if let Some(response) = b {
                    let _ = book.respond(&beta(), response, Timestamp(20));
                }
                book.expire(DEADLINE);

                let resolution = book.resolution().cloned().expect("resolved after deadline");
                let expected_proceed = a == Some(Accept) && b == Some(Accept);
                assert_eq!(resolution.is_proceed(), expected_proceed, "{a:?}/{b:?}");
                assert_ne!(resolution.is_proceed(), resolution.is_cancel());
            }
        }
    }

    #[test]
    fn response_parses_case_insensitively() {
        assert_eq!("ACCEPT".parse::<AcceptanceResponse>(), Ok(AcceptanceResponse::Accept));
        assert_eq!("decline".parse::<AcceptanceResponse>(), Ok(AcceptanceResponse::Decline));
        assert!("maybe".parse::<AcceptanceResponse>().is_err());
    }
}
