//! File-based MatchRepository implementation.

use std::fs;
use std::path::{Path, PathBuf};

use combat_core::{CombatMatch, MatchId};

use crate::repository::{MatchRepository, RepositoryError, Result};

/// Stores each match as `match_{id}.json`.
///
/// Writes go to a temp file first and are renamed into place, so a reader
/// never observes a half-written record.
pub struct FileMatchRepository {
    base_dir: PathBuf,
}

impl FileMatchRepository {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).map_err(RepositoryError::Io)?;
        Ok(Self { base_dir })
    }

    fn record_path(&self, id: MatchId) -> PathBuf {
        self.base_dir.join(format!("match_{}.json", id.0))
    }
}

impl MatchRepository for FileMatchRepository {
    fn save(&self, record: &CombatMatch) -> Result<()> {
        let path = self.record_path(record.id);
        let temp_path = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(record)
            .map_err(|e| RepositoryError::Json(e.to_string()))?;
        fs::write(&temp_path, json).map_err(RepositoryError::Io)?;
        fs::rename(&temp_path, &path).map_err(RepositoryError::Io)?;

        tracing::debug!(
            target: "arena::repository",
            match_id = %record.id,
            status = %record.status,
            "saved match record"
        );
        Ok(())
    }

    fn load(&self, id: MatchId) -> Result<Option<CombatMatch>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path).map_err(RepositoryError::Io)?;
        let record: CombatMatch =
            serde_json::from_str(&json).map_err(|e| RepositoryError::Json(e.to_string()))?;

        if record.id != id {
            return Err(RepositoryError::CorruptedData(format!(
                "{} holds {}",
                path.display(),
                record.id
            )));
        }

        Ok(Some(record))
    }

    fn list(&self) -> Result<Vec<MatchId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.base_dir).map_err(RepositoryError::Io)? {
            let path = entry.map_err(RepositoryError::Io)?.path();

            if let Some(filename) = path.file_name().and_then(|s| s.to_str())
                && let Some(id) = filename
                    .strip_prefix("match_")
                    .and_then(|s| s.strip_suffix(".json"))
                && let Ok(id) = id.parse::<u64>()
            {
                ids.push(MatchId(id));
            }
        }

        ids.sort_unstable();
        Ok(ids)
    }
}
