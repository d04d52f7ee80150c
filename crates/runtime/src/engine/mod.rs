//! Engine façade over the per-match tasks.
//!
//! [`CombatEngine`] pairs participants, routes acceptance responses to the
//! owning coordinator, answers status queries and hands out log
//! subscriptions. Everything after pairing runs in background tasks; the
//! engine only reads records and forwards commands.

mod builder;
mod shared;

pub use builder::EngineBuilder;
pub(crate) use shared::EngineShared;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use combat_core::{
    AcceptanceBook, AcceptanceResponse, ArenaId, CombatConfig, CombatMatch, CombatSimulator,
    MatchId, MatchStatus, MatchSummary, Participant, ParticipantId, RespondOutcome, Transition,
    TransitionError, WinMethod, log_digest,
};

use crate::api::{EngineError, Result};
use crate::broadcast::Subscription;
use crate::collaborators::{CollaboratorError, Identity};
use crate::workers::{AcceptanceCoordinator, MatchWorker};

/// Result of replaying a completed match from its recorded inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditReport {
    pub match_id: MatchId,
    /// Hex SHA-256 of the persisted log.
    pub recorded_digest: String,
    /// Hex SHA-256 of the replayed log.
    pub replayed_digest: String,
    pub recorded_entries: usize,
    pub replayed_entries: usize,
    pub recorded_winner: Option<ParticipantId>,
    pub replayed_winner: ParticipantId,
    pub replayed_method: WinMethod,
    /// Set when an operator completed the match.
    pub forced: bool,
}

impl AuditReport {
    /// Persisted log and winner match the replay.
    pub fn is_consistent(&self) -> bool {
        self.recorded_digest == self.replayed_digest
            && self.recorded_winner.as_ref() == Some(&self.replayed_winner)
    }
}

pub struct CombatEngine {
    shared: Arc<EngineShared>,
    workers: Mutex<HashMap<MatchId, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl CombatEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Pairs two participants in `arena` with a fresh random seed.
    pub async fn pair(
        &self,
        first: ParticipantId,
        second: ParticipantId,
        arena: &ArenaId,
    ) -> Result<CombatMatch> {
        self.pair_with_seed(first, second, arena, rand::random())
            .await
    }

    /// Pairs two participants and starts the acceptance window.
    ///
    /// Both must belong to the same world. The arena's combat config is
    /// resolved here and travels with the match to its worker.
    pub async fn pair_with_seed(
        &self,
        first: ParticipantId,
        second: ParticipantId,
        arena: &ArenaId,
        seed: u64,
    ) -> Result<CombatMatch> {
        let config = self.resolve_config(arena).await?;

        let roster = &self.shared.roster;
        let (first_world, second_world) =
            tokio::try_join!(roster.world_of(&first), roster.world_of(&second))?;

        let match_id = MatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let record = CombatMatch::pair(
            match_id,
            Participant::new(first, first_world),
            Participant::new(second, second_world),
            arena.clone(),
            self.shared.clock.now(),
            self.shared.config.acceptance_window_secs,
            seed,
        )
        .inspect_err(|error| {
            if let TransitionError::ServerMismatch { first, second } = error {
                error!(
                    target: "arena::lifecycle",
                    %match_id,
                    %first,
                    %second,
                    "refusing cross-world pairing"
                );
            }
        })?;

        self.shared.insert(&record).await?;
        self.spawn_match(&record, config).await;

        info!(
            target: "arena::engine",
            %match_id,
            arena = %record.arena,
            first = %record.participants[0].id,
            second = %record.participants[1].id,
            deadline = %record.acceptance_deadline,
            "match paired"
        );
        Ok(record)
    }

    async fn spawn_match(&self, record: &CombatMatch, config: CombatConfig) {
        let match_id = record.id;
        let shared = &self.shared;

        let broadcaster = shared
            .broadcasters
            .open(
                match_id,
                Arc::clone(&shared.logs),
                shared.config.broadcast_capacity,
            )
            .await;

        let (coordinator, handle, resolved_rx) = AcceptanceCoordinator::new(
            match_id,
            record.acceptance_book(),
            shared.clock,
            shared.config.command_buffer,
        );
        shared.register_coordinator(match_id, handle).await;
        tokio::spawn(coordinator.run());

        let worker = MatchWorker::new(match_id, config, Arc::clone(shared), broadcaster);
        let task = tokio::spawn(worker.run(resolved_rx));

        let mut workers = self.workers.lock().await;
        workers.retain(|_, task| !task.is_finished());
        workers.insert(match_id, task);
    }

    /// Records a participant's acceptance response.
    ///
    /// Once the coordinator is gone the response is evaluated against the
    /// persisted book without changing it, so late responses still get the
    /// idempotent-or-conflict answer.
    pub async fn respond(
        &self,
        match_id: MatchId,
        participant: &ParticipantId,
        response: AcceptanceResponse,
    ) -> Result<RespondOutcome> {
        if let Some(handle) = self.shared.coordinator(match_id).await
            && let Some(result) = handle.respond(participant.clone(), response).await
        {
            return Ok(result?);
        }

        let mut book = self.persisted_book(match_id)?;
        let outcome = book.respond(participant, response, self.shared.clock.now())?;
        debug!(
            target: "arena::acceptance",
            %match_id,
            %participant,
            %response,
            "late response evaluated against persisted book"
        );
        Ok(outcome)
    }

    /// Current acceptance book: live while pending, persisted afterwards.
    pub async fn acceptances(&self, match_id: MatchId) -> Result<AcceptanceBook> {
        if let Some(handle) = self.shared.coordinator(match_id).await
            && let Some(book) = handle.snapshot().await
        {
            return Ok(book);
        }
        self.persisted_book(match_id)
    }

    fn persisted_book(&self, match_id: MatchId) -> Result<AcceptanceBook> {
        let record = self.shared.load(match_id)?;
        Ok(record
            .acceptances
            .clone()
            .unwrap_or_else(|| record.acceptance_book()))
    }

    /// Status, winner and method of a match.
    ///
    /// Only participants (and operators) may ask. A participant whose world
    /// differs from the match's world gets an integrity error.
    pub async fn status(&self, match_id: MatchId, caller: &Identity) -> Result<MatchSummary> {
        let record = self.shared.load(match_id)?;

        if !caller.operator {
            if !record.is_participant(&caller.participant) {
                return Err(EngineError::Forbidden {
                    match_id,
                    participant: caller.participant.clone(),
                });
            }

            let hosted = &record.participants[0].server;
            if &caller.server != hosted {
                error!(
                    target: "arena::engine",
                    %match_id,
                    participant = %caller.participant,
                    caller = %caller.server,
                    %hosted,
                    "status query across worlds"
                );
                return Err(EngineError::ServerMismatch {
                    match_id,
                    participant: caller.participant.clone(),
                    caller: caller.server.clone(),
                    hosted: hosted.clone(),
                });
            }
        }

        Ok(record.summary())
    }

    /// Resolves the combat config of an arena.
    pub async fn resolve_config(&self, arena: &ArenaId) -> Result<CombatConfig> {
        let found = self
            .shared
            .arenas
            .arena(arena)
            .await
            .map_err(|error| match error {
                CollaboratorError::NotFound { .. } => EngineError::ArenaNotFound(arena.clone()),
                other => other.into(),
            })?;
        Ok(combat_core::resolve(&found))
    }

    /// Full log so far plus the live tail.
    ///
    /// Matches without a live broadcaster (terminal, evicted or from an
    /// earlier process) are replayed from the log repository.
    pub async fn watch(&self, match_id: MatchId, caller: &Identity) -> Result<Subscription> {
        let record = self.shared.load(match_id)?;
        if !self.shared.policy.can_watch(caller, &record) {
            return Err(EngineError::Forbidden {
                match_id,
                participant: caller.participant.clone(),
            });
        }

        if let Some(broadcaster) = self.shared.broadcasters.get(match_id).await {
            return Ok(broadcaster.subscribe()?);
        }

        // The log may have closed since the record above was read.
        let record = self.shared.load(match_id)?;
        let history = self.shared.logs.load(match_id)?;
        let status = record.status.is_terminal().then_some(record.status);
        Ok(Subscription::replay(history, status))
    }

    /// Operator override: completes an ongoing match without finishing the
    /// simulation and closes its log.
    pub async fn force_complete(
        &self,
        match_id: MatchId,
        operator: &Identity,
        winner: ParticipantId,
        method: WinMethod,
        reason: impl Into<String>,
    ) -> Result<CombatMatch> {
        if !operator.operator {
            return Err(EngineError::OperatorOnly {
                operation: "force_complete",
            });
        }

        let reason = reason.into();
        let transition = Transition::ForceComplete {
            operator: operator.participant.to_string(),
            winner: winner.clone(),
            method,
            reason: reason.clone(),
        };
        let record = self.shared.transition(match_id, None, transition).await?;

        warn!(
            target: "arena::lifecycle",
            %match_id,
            operator = %operator.participant,
            %winner,
            %method,
            %reason,
            bypassed_simulation = true,
            "match force-completed"
        );

        self.shared.close_log(match_id, record.status).await?;
        Ok(record)
    }

    /// Replays a completed match from its recorded seed, config and fighters
    /// and compares the result with the persisted log.
    pub async fn audit(&self, match_id: MatchId) -> Result<AuditReport> {
        let record = self.shared.load(match_id)?;
        let (Some(config), Some(fighters)) = (record.config, record.fighters.as_ref()) else {
            return Err(EngineError::WrongStatus {
                match_id,
                status: record.status,
                required: "a simulated match",
            });
        };
        if record.status != MatchStatus::Completed {
            return Err(EngineError::WrongStatus {
                match_id,
                status: record.status,
                required: "completed",
            });
        }

        let recorded = self.shared.logs.load(match_id)?;
        let replayed = CombatSimulator::new().simulate(record.seed, &config, fighters)?;

        let report = AuditReport {
            match_id,
            recorded_digest: hex::encode(log_digest(&recorded)),
            replayed_digest: hex::encode(replayed.digest()),
            recorded_entries: recorded.len(),
            replayed_entries: replayed.entries.len(),
            recorded_winner: record.winner_id.clone(),
            replayed_winner: replayed.winner,
            replayed_method: replayed.method,
            forced: record.forced.is_some(),
        };

        if report.is_consistent() {
            info!(target: "arena::audit", %match_id, digest = %report.replayed_digest, "replay matches");
        } else {
            warn!(
                target: "arena::audit",
                %match_id,
                recorded = %report.recorded_digest,
                replayed = %report.replayed_digest,
                forced = report.forced,
                "replay diverges from recorded log"
            );
        }
        Ok(report)
    }

    /// Drops a terminal match from the in-memory registries. Records and logs
    /// stay in the repositories.
    pub async fn evict(&self, match_id: MatchId) -> Result<()> {
        let record = self.shared.load(match_id)?;
        if !record.status.is_terminal() {
            return Err(EngineError::WrongStatus {
                match_id,
                status: record.status,
                required: "a terminal status",
            });
        }

        self.shared.release_coordinator(match_id).await;
        self.shared.broadcasters.remove(match_id).await;
        self.shared.logs.seal(match_id)?;
        self.workers.lock().await.remove(&match_id);

        debug!(target: "arena::engine", %match_id, "match evicted");
        Ok(())
    }

    /// Raw match record.
    pub async fn record(&self, match_id: MatchId) -> Result<CombatMatch> {
        self.shared.load(match_id)
    }

    /// Stops every per-match task. Matches still pending or ongoing stay
    /// that way in the repository.
    pub async fn shutdown(self) -> Result<()> {
        let released = self.shared.release_all_coordinators().await;

        let workers: Vec<_> = self.workers.lock().await.drain().collect();
        let running = workers
            .iter()
            .filter(|(_, task)| !task.is_finished())
            .count();

        for (_, task) in &workers {
            task.abort();
        }
        for (match_id, task) in workers {
            match task.await {
                Ok(()) => {}
                Err(join_error) if join_error.is_cancelled() => {
                    debug!(target: "arena::engine", %match_id, "match worker aborted");
                }
                Err(join_error) => return Err(EngineError::WorkerJoin(join_error)),
            }
        }

        info!(
            target: "arena::engine",
            coordinators = released,
            interrupted_workers = running,
            "engine shut down"
        );
        Ok(())
    }
}
