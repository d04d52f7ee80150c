//! Match worker: drives one match from its acceptance resolution to a
//! terminal status.
//!
//! 1. await the coordinator's resolution and persist the final book
//! 2. cancel, or re-check worlds and move to `ongoing`
//! 3. snapshot fighters, run the simulation eagerly
//! 4. release entries through the broadcaster at the action interval
//! 5. complete (or fail) the match and close the log
//!
//! Record writes are retried with exponential backoff. If the repository
//! keeps refusing, the log is still closed so watchers are not left hanging.
//!
//! A forced completion closes the log from outside; the worker notices on its
//! next append and stops without touching the record again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

use combat_core::{
    AcceptanceBook, CancelReason, CombatConfig, CombatMatch, CombatSimulator, Fighter, MatchId,
    MatchStatus, Resolution, ServerId, Transition, TransitionError,
};

use super::coordinator::Resolved;
use crate::api::{EngineError, Result};
use crate::broadcast::{BroadcastError, LogBroadcaster};
use crate::engine::EngineShared;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY_MS: u64 = 100;

pub(crate) struct MatchWorker {
    match_id: MatchId,
    config: CombatConfig,
    shared: Arc<EngineShared>,
    broadcaster: Arc<LogBroadcaster>,
}

impl MatchWorker {
    pub(crate) fn new(
        match_id: MatchId,
        config: CombatConfig,
        shared: Arc<EngineShared>,
        broadcaster: Arc<LogBroadcaster>,
    ) -> Self {
        Self {
            match_id,
            config,
            shared,
            broadcaster,
        }
    }

    pub(crate) async fn run(self, resolved_rx: oneshot::Receiver<Resolved>) {
        let match_id = self.match_id;

        let Ok(resolved) = resolved_rx.await else {
            debug!(target: "arena::worker", %match_id, "coordinator dropped before resolving");
            return;
        };

        let concluded = self.conclude_acceptance(resolved).await;
        self.shared.release_coordinator(match_id).await;

        let terminal = match concluded {
            Ok(MatchStatus::Ongoing) => self.fight().await,
            Ok(status) => Some(status),
            Err(error) => {
                error!(
                    target: "arena::worker",
                    %match_id,
                    %error,
                    "failed to conclude acceptance; closing log as cancelled"
                );
                Some(MatchStatus::Cancelled)
            }
        };

        if let Some(status) = terminal
            && let Err(error) = self.shared.close_log(match_id, status).await
        {
            warn!(target: "arena::worker", %match_id, %error, "failed to close log");
        }
    }

    /// Persists the book and applies the matching transition.
    async fn conclude_acceptance(&self, resolved: Resolved) -> Result<MatchStatus> {
        let Resolved { resolution, book } = resolved;

        match resolution {
            Resolution::Cancel(_) => {
                let record = self
                    .persist(Some(book), Transition::Cancel { resolution })
                    .await?;
                Ok(record.status)
            }
            Resolution::Proceed => self.begin(book).await,
        }
    }

    async fn begin(&self, book: AcceptanceBook) -> Result<MatchStatus> {
        let record = self.shared.load(self.match_id)?;

        let worlds = match self.current_worlds(&record).await {
            Ok(worlds) => worlds,
            Err(error) => {
                error!(
                    target: "arena::lifecycle",
                    match_id = %self.match_id,
                    %error,
                    "participant world lookup failed at proceed; cancelling"
                );
                return self.cancel_for_mismatch(book).await;
            }
        };

        let begin = Transition::Begin {
            resolution: Resolution::Proceed,
            worlds,
            config: self.config,
        };

        match self.persist(Some(book.clone()), begin).await {
            Ok(record) => Ok(record.status),
            Err(EngineError::Transition(TransitionError::ServerMismatch { first, second })) => {
                error!(
                    target: "arena::lifecycle",
                    match_id = %self.match_id,
                    %first,
                    %second,
                    "participants no longer share a world; cancelling"
                );
                self.cancel_for_mismatch(book).await
            }
            Err(error) => Err(error),
        }
    }

    async fn cancel_for_mismatch(&self, book: AcceptanceBook) -> Result<MatchStatus> {
        let cancel = Transition::Cancel {
            resolution: Resolution::Cancel(CancelReason::ServerMismatch),
        };
        let record = self.persist(Some(book), cancel).await?;
        Ok(record.status)
    }

    /// Applies a transition, retrying retryable failures with exponential
    /// backoff. A failed attempt leaves the stored record untouched.
    async fn persist(
        &self,
        book: Option<AcceptanceBook>,
        transition: Transition,
    ) -> Result<CombatMatch> {
        let mut attempt = 0;
        loop {
            match self
                .shared
                .transition(self.match_id, book.clone(), transition.clone())
                .await
            {
                Ok(record) => {
                    if attempt > 0 {
                        info!(
                            target: "arena::worker",
                            match_id = %self.match_id,
                            retries = attempt,
                            "transition persisted after retry"
                        );
                    }
                    return Ok(record);
                }
                Err(error) if error.kind().is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                    let delay = Duration::from_millis(BASE_DELAY_MS << attempt);
                    warn!(
                        target: "arena::worker",
                        match_id = %self.match_id,
                        attempt = attempt + 1,
                        max_attempts = MAX_ATTEMPTS,
                        %error,
                        ?delay,
                        "failed to persist transition; retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn current_worlds(&self, record: &CombatMatch) -> Result<[ServerId; 2]> {
        let [first, second] = record.participant_ids();
        let (first, second) = tokio::try_join!(
            self.shared.roster.world_of(first),
            self.shared.roster.world_of(second),
        )?;
        Ok([first, second])
    }

    /// Runs the ongoing phase. Returns the terminal status this worker
    /// reached, or `None` if someone else finished the match.
    async fn fight(&self) -> Option<MatchStatus> {
        match self.simulate_and_stream().await {
            Ok(status) => status,
            Err(error) => {
                error!(
                    target: "arena::worker",
                    match_id = %self.match_id,
                    %error,
                    "match failed"
                );
                let fail = Transition::Fail {
                    reason: error.to_string(),
                };
                match self.persist(None, fail).await {
                    Ok(record) => Some(record.status),
                    Err(EngineError::Transition(TransitionError::InvalidTransition {
                        from, ..
                    })) if from.is_terminal() => None,
                    Err(error) => {
                        error!(
                            target: "arena::worker",
                            match_id = %self.match_id,
                            %error,
                            "could not record failure; closing log as failed"
                        );
                        Some(MatchStatus::Failed)
                    }
                }
            }
        }
    }

    async fn simulate_and_stream(&self) -> Result<Option<MatchStatus>> {
        let record = self.shared.load(self.match_id)?;
        let fighters = self.fighters(&record).await?;

        let snapshot = fighters.clone();
        self.shared
            .update(self.match_id, move |record| {
                record.record_fighters(snapshot).map_err(EngineError::from)
            })
            .await?;

        let outcome = CombatSimulator::new().simulate(record.seed, &self.config, &fighters)?;

        info!(
            target: "arena::worker",
            match_id = %self.match_id,
            winner = %outcome.winner,
            method = %outcome.method,
            total_actions = outcome.total_actions,
            entries = outcome.entries.len(),
            digest = %hex::encode(outcome.digest()),
            "simulation finished; releasing log"
        );

        let mut ticker = self.shared.config.pace_log.then(|| {
            let mut ticker = interval(Duration::from_millis(self.config.action_interval_millis()));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        for entry in outcome.entries.iter().cloned() {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }

            match self.broadcaster.append(entry) {
                Ok(()) => {}
                Err(BroadcastError::Closed { status, .. }) => {
                    info!(
                        target: "arena::worker",
                        match_id = %self.match_id,
                        %status,
                        "log closed externally; stopping"
                    );
                    return Ok(None);
                }
                Err(error) => return Err(error.into()),
            }
        }

        let complete = Transition::Complete {
            winner: outcome.winner,
            method: outcome.method,
            total_actions: outcome.total_actions,
        };
        match self.persist(None, complete).await {
            Ok(record) => Ok(Some(record.status)),
            Err(EngineError::Transition(TransitionError::InvalidTransition { from, .. }))
                if from.is_terminal() =>
            {
                warn!(
                    target: "arena::worker",
                    match_id = %self.match_id,
                    status = %from,
                    "match finished elsewhere before completion"
                );
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    async fn fighters(&self, record: &CombatMatch) -> Result<[Fighter; 2]> {
        let [first, second] = record.participant_ids();
        let (first_stats, second_stats) = tokio::try_join!(
            self.shared.roster.stats_of(first),
            self.shared.roster.stats_of(second),
        )?;

        Ok([
            Fighter::new(first.clone(), first_stats),
            Fighter::new(second.clone(), second_stats),
        ])
    }
}
