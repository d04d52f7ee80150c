use std::collections::BTreeMap;
use std::sync::RwLock;

use combat_core::{CombatMatch, MatchId};

use crate::repository::{MatchRepository, RepositoryError, Result};

/// Thread-safe but not persistent across process restarts.
#[derive(Default)]
pub struct InMemoryMatchRepository {
    records: RwLock<BTreeMap<MatchId, CombatMatch>>,
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchRepository for InMemoryMatchRepository {
    fn save(&self, record: &CombatMatch) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        records.insert(record.id, record.clone());
        Ok(())
    }

    fn load(&self, id: MatchId) -> Result<Option<CombatMatch>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        Ok(records.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<MatchId>> {
        let records = self
            .records
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        Ok(records.keys().copied().collect())
    }
}
