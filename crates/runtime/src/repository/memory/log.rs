use std::collections::HashMap;
use std::sync::RwLock;

use combat_core::{LogEntry, MatchId};

use crate::repository::{LogRepository, RepositoryError, Result};

/// In-memory combat logs, one vector per match.
#[derive(Default)]
pub struct InMemoryLogRepository {
    logs: RwLock<HashMap<MatchId, Vec<LogEntry>>>,
}

impl InMemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogRepository for InMemoryLogRepository {
    fn append(&self, match_id: MatchId, entry: &LogEntry) -> Result<()> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        let log = logs.entry(match_id).or_default();
        let expected = log.len() as u32;
        if entry.sequence != expected {
            return Err(RepositoryError::SequenceGap {
                match_id,
                expected,
                found: entry.sequence,
            });
        }

        log.push(entry.clone());
        Ok(())
    }

    fn load(&self, match_id: MatchId) -> Result<Vec<LogEntry>> {
        let logs = self
            .logs
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;

        Ok(logs.get(&match_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::ActionKind;

    fn entry(sequence: u32) -> LogEntry {
        LogEntry {
            sequence,
            turn: sequence,
            offset_ms: 0,
            actor_id: "alpha".into(),
            target_id: "beta".into(),
            action_kind: ActionKind::Miss,
            damage: 0,
            effect: None,
            health_after: 100,
            narration: "alpha swings at beta and misses".into(),
        }
    }

    #[test]
    fn rejects_gaps_and_repeats() {
        let repo = InMemoryLogRepository::new();
        let id = MatchId(1);

        repo.append(id, &entry(0)).unwrap();
        repo.append(id, &entry(1)).unwrap();
        assert!(matches!(
            repo.append(id, &entry(1)),
            Err(RepositoryError::SequenceGap { expected: 2, found: 1, .. })
        ));
        assert!(repo.append(id, &entry(3)).is_err());

        assert_eq!(repo.load(id).unwrap().len(), 2);
        assert!(repo.load(MatchId(2)).unwrap().is_empty());
    }
}
