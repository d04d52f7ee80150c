use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use tokio::sync::Mutex;
use tracing::info;

use super::{CombatEngine, EngineShared};
use crate::api::{EngineError, Result};
use crate::clock::MatchClock;
use crate::collaborators::{AccessPolicy, ArenaDirectory, ParticipantsOnly, Roster};
use crate::config::EngineConfig;
use crate::repository::{
    FileLogRepository, FileMatchRepository, InMemoryLogRepository, InMemoryMatchRepository,
    LogRepository, MatchRepository,
};

/// Builder for [`CombatEngine`].
///
/// Roster and arena directory are required. Repositories default to the
/// file-backed ones when [`EngineConfig::data_dir`] is set, in-memory ones
/// otherwise.
pub struct EngineBuilder {
    config: EngineConfig,
    clock: Option<MatchClock>,
    matches: Option<Arc<dyn MatchRepository>>,
    logs: Option<Arc<dyn LogRepository>>,
    roster: Option<Arc<dyn Roster>>,
    arenas: Option<Arc<dyn ArenaDirectory>>,
    policy: Option<Arc<dyn AccessPolicy>>,
}

impl EngineBuilder {
    pub(super) fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            clock: None,
            matches: None,
            logs: None,
            roster: None,
            arenas: None,
            policy: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Pins the wall-clock origin; defaults to the system time at build.
    pub fn clock(mut self, clock: MatchClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn match_repository(mut self, matches: Arc<dyn MatchRepository>) -> Self {
        self.matches = Some(matches);
        self
    }

    pub fn log_repository(mut self, logs: Arc<dyn LogRepository>) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn roster(mut self, roster: impl Roster + 'static) -> Self {
        self.roster = Some(Arc::new(roster));
        self
    }

    pub fn shared_roster(mut self, roster: Arc<dyn Roster>) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn arenas(mut self, arenas: impl ArenaDirectory + 'static) -> Self {
        self.arenas = Some(Arc::new(arenas));
        self
    }

    /// Who may watch a match. Defaults to [`ParticipantsOnly`].
    pub fn access_policy(mut self, policy: impl AccessPolicy + 'static) -> Self {
        self.policy = Some(Arc::new(policy));
        self
    }

    pub fn build(self) -> Result<CombatEngine> {
        let roster = self
            .roster
            .ok_or(EngineError::MissingCollaborator { name: "roster" })?;
        let arenas = self.arenas.ok_or(EngineError::MissingCollaborator {
            name: "arena directory",
        })?;
        let policy = self
            .policy
            .unwrap_or_else(|| Arc::new(ParticipantsOnly) as Arc<dyn AccessPolicy>);

        let (matches, logs) = open_repositories(&self.config, self.matches, self.logs)?;

        // Continue numbering after whatever the repository already holds.
        let next_id = matches
            .list()?
            .into_iter()
            .map(|id| id.0)
            .max()
            .map_or(1, |max| max + 1);

        let clock = self.clock.unwrap_or_else(MatchClock::system);
        let shared = EngineShared::new(
            self.config,
            clock,
            matches,
            logs,
            roster,
            arenas,
            policy,
        );

        Ok(CombatEngine {
            shared: Arc::new(shared),
            workers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(next_id),
        })
    }
}

fn open_repositories(
    config: &EngineConfig,
    matches: Option<Arc<dyn MatchRepository>>,
    logs: Option<Arc<dyn LogRepository>>,
) -> Result<(Arc<dyn MatchRepository>, Arc<dyn LogRepository>)> {
    let Some(dir) = &config.data_dir else {
        let matches = matches.unwrap_or_else(|| Arc::new(InMemoryMatchRepository::new()));
        let logs = logs.unwrap_or_else(|| Arc::new(InMemoryLogRepository::new()));
        return Ok((matches, logs));
    };

    info!(target: "arena::engine", data_dir = %dir.display(), "using file repositories");

    let matches: Arc<dyn MatchRepository> = match matches {
        Some(matches) => matches,
        None => Arc::new(FileMatchRepository::new(dir.join("matches"))?),
    };
    let logs: Arc<dyn LogRepository> = match logs {
        Some(logs) => logs,
        None => Arc::new(FileLogRepository::new(dir.join("logs"))?),
    };
    Ok((matches, logs))
}
