//! Canonical match lifecycle.
//!
//! [`CombatMatch`] is the aggregate root and [`CombatMatch::apply`] is the only
//! way its status changes. Legal edges:
//!
//! ```text
//! pending_acceptance ──proceed──▶ ongoing ──complete / force──▶ completed
//!         │                          └──────fail──────────────▶ failed
//!         └──────cancel──────▶ cancelled
//! ```
//!
//! Anything else is rejected with [`TransitionError`]; the machine never fixes
//! up an inconsistent request.

use crate::acceptance::{AcceptanceBook, CancelReason, Resolution};
use crate::combat::Fighter;
use crate::config::CombatConfig;
use crate::error::{CombatError, ErrorKind};
use crate::types::{ArenaId, MatchId, Participant, ParticipantId, ServerId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum MatchStatus {
    PendingAcceptance,
    Ongoing,
    Completed,
    Cancelled,
    Failed,
}

impl MatchStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub const fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::PendingAcceptance, Self::Ongoing)
                | (Self::PendingAcceptance, Self::Cancelled)
                | (Self::Ongoing, Self::Completed)
                | (Self::Ongoing, Self::Failed)
        )
    }
}

/// How a completed match was decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[strum(serialize_all = "snake_case")]
pub enum WinMethod {
    Knockout,
    Death,
    Technical,
    Timeout,
}

/// A requested lifecycle change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Start the fight after a proceed resolution. `worlds` are the
    /// participants' worlds as re-read from the roster at transition time.
    Begin {
        resolution: Resolution,
        worlds: [ServerId; 2],
        config: CombatConfig,
    },
    Cancel {
        resolution: Resolution,
    },
    Complete {
        winner: ParticipantId,
        method: WinMethod,
        total_actions: u32,
    },
    Fail {
        reason: String,
    },
    /// Operator recovery of a stuck match; bypasses the simulation.
    ForceComplete {
        operator: String,
        winner: ParticipantId,
        method: WinMethod,
        reason: String,
    },
}

impl Transition {
    pub const fn target(&self) -> MatchStatus {
        match self {
            Self::Begin { .. } => MatchStatus::Ongoing,
            Self::Cancel { .. } => MatchStatus::Cancelled,
            Self::Complete { .. } | Self::ForceComplete { .. } => MatchStatus::Completed,
            Self::Fail { .. } => MatchStatus::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("transition to {to} requires a {expected} resolution, got {resolution:?}")]
    ResolutionMismatch {
        to: MatchStatus,
        expected: &'static str,
        resolution: Resolution,
    },

    #[error("participants belong to different worlds ({first} vs {second})")]
    ServerMismatch { first: ServerId, second: ServerId },

    #[error("{participant} cannot be paired against themselves")]
    SelfPairing { participant: ParticipantId },

    #[error("{participant} is not a participant of this match")]
    NotAParticipant { participant: ParticipantId },

    #[error("fighter {fighter} does not match participant {participant}")]
    FighterMismatch {
        fighter: ParticipantId,
        participant: ParticipantId,
    },

    #[error("combat config out of bounds: {config:?}")]
    ConfigOutOfBounds { config: CombatConfig },
}

impl CombatError for TransitionError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } | Self::ResolutionMismatch { .. } => ErrorKind::Conflict,
            Self::ServerMismatch { .. } => ErrorKind::Integrity,
            Self::SelfPairing { .. }
            | Self::NotAParticipant { .. }
            | Self::FighterMismatch { .. }
            | Self::ConfigOutOfBounds { .. } => ErrorKind::InvalidArgument,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "transition.invalid",
            Self::ResolutionMismatch { .. } => "transition.resolution_mismatch",
            Self::ServerMismatch { .. } => "transition.server_mismatch",
            Self::SelfPairing { .. } => "transition.self_pairing",
            Self::NotAParticipant { .. } => "transition.not_participant",
            Self::FighterMismatch { .. } => "transition.fighter_mismatch",
            Self::ConfigOutOfBounds { .. } => "transition.config_out_of_bounds",
        }
    }
}

/// Status view returned to pollers.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MatchSummary {
    pub status: MatchStatus,
    pub winner_id: Option<ParticipantId>,
    pub winner_method: Option<WinMethod>,
}

/// The match record.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatMatch {
    pub id: MatchId,
    pub participants: [Participant; 2],
    pub arena: ArenaId,
    pub status: MatchStatus,
    pub acceptance_deadline: Timestamp,
    pub matched_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub winner_id: Option<ParticipantId>,
    pub winner_method: Option<WinMethod>,
    pub total_actions: u32,
    /// Simulation seed, fixed at pairing so the fight can be replayed.
    pub seed: u64,
    pub config: Option<CombatConfig>,
    pub fighters: Option<[Fighter; 2]>,
    pub acceptances: Option<AcceptanceBook>,
    pub cancel_reason: Option<CancelReason>,
    pub failure_reason: Option<String>,
    pub forced: Option<ForcedCompletion>,
}

/// Audit record of an operator override.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForcedCompletion {
    pub operator: String,
    pub reason: String,
}

impl CombatMatch {
    /// Creates a pending match. Both participants must share a world.
    pub fn pair(
        id: MatchId,
        first: Participant,
        second: Participant,
        arena: ArenaId,
        matched_at: Timestamp,
        acceptance_window_secs: u64,
        seed: u64,
    ) -> Result<Self, TransitionError> {
        if first.id == second.id {
            return Err(TransitionError::SelfPairing {
                participant: first.id,
            });
        }
        if !first.same_world(&second) {
            return Err(TransitionError::ServerMismatch {
                first: first.server,
                second: second.server,
            });
        }

        Ok(Self {
            id,
            participants: [first, second],
            arena,
            status: MatchStatus::PendingAcceptance,
            acceptance_deadline: matched_at.saturating_add_secs(acceptance_window_secs),
            matched_at,
            started_at: None,
            completed_at: None,
            winner_id: None,
            winner_method: None,
            total_actions: 0,
            seed,
            config: None,
            fighters: None,
            acceptances: None,
            cancel_reason: None,
            failure_reason: None,
            forced: None,
        })
    }

    /// Fresh acceptance book for this pairing.
    pub fn acceptance_book(&self) -> AcceptanceBook {
        AcceptanceBook::new(
            self.participants[0].id.clone(),
            self.participants[1].id.clone(),
            self.matched_at,
            self.acceptance_deadline,
        )
    }

    pub fn participant(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn is_participant(&self, id: &ParticipantId) -> bool {
        self.participant(id).is_some()
    }

    pub fn participant_ids(&self) -> [&ParticipantId; 2] {
        [&self.participants[0].id, &self.participants[1].id]
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            status: self.status,
            winner_id: self.winner_id.clone(),
            winner_method: self.winner_method,
        }
    }

    /// Stores the final acceptance book. Only legal while pending.
    pub fn record_acceptances(&mut self, book: AcceptanceBook) -> Result<(), TransitionError> {
        if self.status != MatchStatus::PendingAcceptance {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: MatchStatus::PendingAcceptance,
            });
        }
        self.acceptances = Some(book);
        Ok(())
    }

    /// Snapshots both combatants' stats. Only legal once, while ongoing, with
    /// fighters in participant order.
    pub fn record_fighters(&mut self, fighters: [Fighter; 2]) -> Result<(), TransitionError> {
        if self.status != MatchStatus::Ongoing || self.fighters.is_some() {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: MatchStatus::Ongoing,
            });
        }

        for (fighter, participant) in fighters.iter().zip(self.participants.iter()) {
            if fighter.id != participant.id {
                return Err(TransitionError::FighterMismatch {
                    fighter: fighter.id.clone(),
                    participant: participant.id.clone(),
                });
            }
        }

        self.fighters = Some(fighters);
        Ok(())
    }

    /// Applies a guarded transition, returning the new status.
    pub fn apply(
        &mut self,
        transition: Transition,
        now: Timestamp,
    ) -> Result<MatchStatus, TransitionError> {
        let target = transition.target();
        if !self.status.can_transition_to(target) {
            return Err(TransitionError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }

        match transition {
            Transition::Begin {
                resolution,
                worlds,
                config,
            } => self.begin(resolution, worlds, config, now)?,
            Transition::Cancel { resolution } => match resolution {
                Resolution::Cancel(reason) => {
                    self.cancel_reason = Some(reason);
                    self.completed_at = Some(now);
                }
                Resolution::Proceed => {
                    return Err(TransitionError::ResolutionMismatch {
                        to: target,
                        expected: "cancel",
                        resolution: Resolution::Proceed,
                    });
                }
            },
            Transition::Complete {
                winner,
                method,
                total_actions,
            } => {
                self.ensure_participant(&winner)?;
                self.finish(winner, method, now);
                self.total_actions = total_actions;
            }
            Transition::Fail { reason } => {
                self.failure_reason = Some(reason);
                self.completed_at = Some(now);
            }
            Transition::ForceComplete {
                operator,
                winner,
                method,
                reason,
            } => {
                self.ensure_participant(&winner)?;
                self.finish(winner, method, now);
                self.forced = Some(ForcedCompletion { operator, reason });
            }
        }

        self.status = target;
        Ok(target)
    }

    fn begin(
        &mut self,
        resolution: Resolution,
        worlds: [ServerId; 2],
        config: CombatConfig,
        now: Timestamp,
    ) -> Result<(), TransitionError> {
        if !resolution.is_proceed() {
            return Err(TransitionError::ResolutionMismatch {
                to: MatchStatus::Ongoing,
                expected: "proceed",
                resolution,
            });
        }

        let [first, second] = worlds;
        if first != second {
            return Err(TransitionError::ServerMismatch { first, second });
        }

        if !config.is_within_bounds() {
            return Err(TransitionError::ConfigOutOfBounds { config });
        }

        self.config = Some(config);
        self.started_at = Some(now);
        Ok(())
    }

    fn finish(&mut self, winner: ParticipantId, method: WinMethod, now: Timestamp) {
        self.winner_id = Some(winner);
        self.winner_method = Some(method);
        self.completed_at = Some(now);
    }

    fn ensure_participant(&self, id: &ParticipantId) -> Result<(), TransitionError> {
        if self.is_participant(id) {
            Ok(())
        } else {
            Err(TransitionError::NotAParticipant {
                participant: id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::CombatantStats;

    fn pending() -> CombatMatch {
        CombatMatch::pair(
            MatchId(1),
            Participant::new("alpha", "gaul"),
            Participant::new("beta", "gaul"),
            "training-grounds".into(),
            Timestamp(1_000),
            60,
            42,
        )
        .unwrap()
    }

    fn fighters() -> [Fighter; 2] {
        [
            Fighter::new("alpha", CombatantStats::default()),
            Fighter::new("beta", CombatantStats::default()),
        ]
    }

    fn begin(resolution: Resolution, worlds: [&str; 2]) -> Transition {
        Transition::Begin {
            resolution,
            worlds: [worlds[0].into(), worlds[1].into()],
            config: CombatConfig::SAFE,
        }
    }

    fn ongoing() -> CombatMatch {
        let mut record = pending();
        record
            .apply(begin(Resolution::Proceed, ["gaul", "gaul"]), Timestamp(2_000))
            .unwrap();
        record
    }

    #[test]
    fn pairing_sets_deadline_from_window() {
        let record = pending();
        assert_eq!(record.status, MatchStatus::PendingAcceptance);
        assert_eq!(record.acceptance_deadline, Timestamp(61_000));
        assert_eq!(record.acceptance_book().deadline(), Timestamp(61_000));
    }

    #[test]
    fn pairing_across_worlds_is_refused() {
        let err = CombatMatch::pair(
            MatchId(1),
            Participant::new("alpha", "gaul"),
            Participant::new("beta", "egypt"),
            "pit".into(),
            Timestamp(0),
            60,
            0,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Integrity);
    }

    #[test]
    fn pairing_against_self_is_refused() {
        let err = CombatMatch::pair(
            MatchId(1),
            Participant::new("alpha", "gaul"),
            Participant::new("alpha", "gaul"),
            "pit".into(),
            Timestamp(0),
            60,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::SelfPairing { .. }));
    }

    #[test]
    fn proceed_starts_the_match() {
        let record = ongoing();
        assert_eq!(record.status, MatchStatus::Ongoing);
        assert_eq!(record.config, Some(CombatConfig::SAFE));
        assert_eq!(record.started_at, Some(Timestamp(2_000)));
    }

    #[test]
    fn fighters_are_snapshotted_once_in_participant_order() {
        let mut record = pending();
        assert!(record.record_fighters(fighters()).is_err());

        let mut record = ongoing();
        let swapped = {
            let [a, b] = fighters();
            [b, a]
        };
        let err = record.record_fighters(swapped).unwrap_err();
        assert!(matches!(err, TransitionError::FighterMismatch { .. }));

        record.record_fighters(fighters()).unwrap();
        assert_eq!(record.fighters, Some(fighters()));
        assert!(record.record_fighters(fighters()).is_err());
    }

    #[test]
    fn begin_rechecks_worlds_even_when_both_accepted() {
        let mut record = pending();
        let err = record
            .apply(begin(Resolution::Proceed, ["gaul", "egypt"]), Timestamp(2_000))
            .unwrap_err();

        assert!(matches!(err, TransitionError::ServerMismatch { .. }));
        assert_eq!(record.status, MatchStatus::PendingAcceptance);
    }

    #[test]
    fn begin_requires_proceed() {
        let mut record = pending();
        let err = record
            .apply(
                begin(Resolution::Cancel(CancelReason::Timeout), ["gaul", "gaul"]),
                Timestamp(2_000),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn cancel_records_reason() {
        let mut record = pending();
        record
            .apply(
                Transition::Cancel {
                    resolution: Resolution::Cancel(CancelReason::Timeout),
                },
                Timestamp(61_000),
            )
            .unwrap();

        assert_eq!(record.status, MatchStatus::Cancelled);
        assert_eq!(record.cancel_reason, Some(CancelReason::Timeout));
        assert!(record.status.is_terminal());
    }

    #[test]
    fn complete_requires_a_participant_winner() {
        let mut record = ongoing();
        let err = record
            .apply(
                Transition::Complete {
                    winner: "mallory".into(),
                    method: WinMethod::Knockout,
                    total_actions: 3,
                },
                Timestamp(3_000),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(record.status, MatchStatus::Ongoing);

        record
            .apply(
                Transition::Complete {
                    winner: "beta".into(),
                    method: WinMethod::Knockout,
                    total_actions: 3,
                },
                Timestamp(3_000),
            )
            .unwrap();
        assert_eq!(
            record.summary(),
            MatchSummary {
                status: MatchStatus::Completed,
                winner_id: Some("beta".into()),
                winner_method: Some(WinMethod::Knockout),
            }
        );
    }

    #[test]
    fn unguarded_edges_are_rejected() {
        let mut record = pending();
        let err = record
            .apply(
                Transition::Complete {
                    winner: "alpha".into(),
                    method: WinMethod::Technical,
                    total_actions: 20,
                },
                Timestamp(2_000),
            )
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::InvalidTransition {
                from: MatchStatus::PendingAcceptance,
                to: MatchStatus::Completed,
            }
        );

        let mut record = ongoing();
        record
            .apply(
                Transition::Fail {
                    reason: "storage".into(),
                },
                Timestamp(3_000),
            )
            .unwrap();
        let err = record
            .apply(
                Transition::Cancel {
                    resolution: Resolution::Cancel(CancelReason::Timeout),
                },
                Timestamp(4_000),
            )
            .unwrap_err();
        assert!(matches!(err, TransitionError::InvalidTransition { .. }));
    }

    #[test]
    fn force_complete_records_operator() {
        let mut record = ongoing();
        record
            .apply(
                Transition::ForceComplete {
                    operator: "ops".into(),
                    winner: "alpha".into(),
                    method: WinMethod::Timeout,
                    reason: "worker stuck".into(),
                },
                Timestamp(9_000),
            )
            .unwrap();
        assert_eq!(record.status, MatchStatus::Completed);
        assert_eq!(
            record.forced,
            Some(ForcedCompletion {
                operator: "ops".into(),
                reason: "worker stuck".into(),
            })
        );
    }

    #[test]
    fn transition_table_matches_lifecycle() {
        use MatchStatus::*;
        let all = [PendingAcceptance, Ongoing, Completed, Cancelled, Failed];
        let legal = [
            (PendingAcceptance, Ongoing),
            (PendingAcceptance, Cancelled),
            (Ongoing, Completed),
            (Ongoing, Failed),
        ];
        for from in all {
            for to in all {
                assert_eq!(from.can_transition_to(to), legal.contains(&(from, to)));
            }
        }
    }
}
