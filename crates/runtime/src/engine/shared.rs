//! State shared between the engine façade and its per-match tasks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use combat_core::{AcceptanceBook, CombatMatch, MatchId, MatchStatus, Transition};

use crate::api::{EngineError, Result};
use crate::broadcast::BroadcastRegistry;
use crate::clock::MatchClock;
use crate::collaborators::{AccessPolicy, ArenaDirectory, Roster};
use crate::config::EngineConfig;
use crate::repository::{LogRepository, MatchRepository};
use crate::workers::CoordinatorHandle;

pub(crate) struct EngineShared {
    pub(crate) config: EngineConfig,
    pub(crate) clock: MatchClock,
    pub(crate) matches: Arc<dyn MatchRepository>,
    pub(crate) logs: Arc<dyn LogRepository>,
    pub(crate) roster: Arc<dyn Roster>,
    pub(crate) arenas: Arc<dyn ArenaDirectory>,
    pub(crate) policy: Arc<dyn AccessPolicy>,
    pub(crate) broadcasters: BroadcastRegistry,
    coordinators: Mutex<HashMap<MatchId, CoordinatorHandle>>,
    /// Serializes read-modify-write cycles on match records.
    record_lock: Mutex<()>,
}

impl EngineShared {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: EngineConfig,
        clock: MatchClock,
        matches: Arc<dyn MatchRepository>,
        logs: Arc<dyn LogRepository>,
        roster: Arc<dyn Roster>,
        arenas: Arc<dyn ArenaDirectory>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            config,
            clock,
            matches,
            logs,
            roster,
            arenas,
            policy,
            broadcasters: BroadcastRegistry::new(),
            coordinators: Mutex::new(HashMap::new()),
            record_lock: Mutex::new(()),
        }
    }

    pub(crate) fn load(&self, match_id: MatchId) -> Result<CombatMatch> {
        self.matches
            .load(match_id)?
            .ok_or(EngineError::MatchNotFound(match_id))
    }

    pub(crate) async fn insert(&self, record: &CombatMatch) -> Result<()> {
        let _guard = self.record_lock.lock().await;
        self.matches.save(record)?;
        Ok(())
    }

    /// Loads, mutates and saves a record under the record lock. Nothing is
    /// saved if `mutate` fails.
    pub(crate) async fn update<T>(
        &self,
        match_id: MatchId,
        mutate: impl FnOnce(&mut CombatMatch) -> Result<T>,
    ) -> Result<(CombatMatch, T)> {
        let _guard = self.record_lock.lock().await;

        let mut record = self.load(match_id)?;
        let value = mutate(&mut record)?;
        self.matches.save(&record)?;
        Ok((record, value))
    }

    /// Applies a lifecycle transition, optionally storing the final
    /// acceptance book in the same write.
    pub(crate) async fn transition(
        &self,
        match_id: MatchId,
        book: Option<AcceptanceBook>,
        transition: Transition,
    ) -> Result<CombatMatch> {
        let now = self.clock.now();
        let (record, from) = self
            .update(match_id, |record| {
                let from = record.status;
                if let Some(book) = book {
                    record.record_acceptances(book)?;
                }
                record.apply(transition, now)?;
                Ok(from)
            })
            .await?;

        info!(
            target: "arena::lifecycle",
            %match_id,
            %from,
            to = %record.status,
            "match transitioned"
        );
        Ok(record)
    }

    pub(crate) async fn register_coordinator(&self, match_id: MatchId, handle: CoordinatorHandle) {
        self.coordinators.lock().await.insert(match_id, handle);
    }

    pub(crate) async fn coordinator(&self, match_id: MatchId) -> Option<CoordinatorHandle> {
        self.coordinators.lock().await.get(&match_id).cloned()
    }

    /// Drops the engine's coordinator handle; the task exits once in-flight
    /// callers release theirs.
    pub(crate) async fn release_coordinator(&self, match_id: MatchId) {
        self.coordinators.lock().await.remove(&match_id);
    }

    pub(crate) async fn release_all_coordinators(&self) -> usize {
        let mut coordinators = self.coordinators.lock().await;
        let count = coordinators.len();
        coordinators.clear();
        count
    }

    /// Closes and unregisters a match's broadcaster after a terminal
    /// transition, then seals its stored log.
    pub(crate) async fn close_log(&self, match_id: MatchId, status: MatchStatus) -> Result<()> {
        if let Some(broadcaster) = self.broadcasters.remove(match_id).await {
            broadcaster.close(status)?;
        }
        self.logs.seal(match_id)?;
        Ok(())
    }
}
