//! Repository contracts for match records and combat logs.

use combat_core::{CombatMatch, LogEntry, MatchId};

use super::Result;

/// Persistence for match records.
///
/// `save` overwrites the whole record; callers serialize read-modify-write
/// cycles themselves.
pub trait MatchRepository: Send + Sync {
    fn save(&self, record: &CombatMatch) -> Result<()>;

    fn load(&self, id: MatchId) -> Result<Option<CombatMatch>>;

    /// Ids of every stored match, ascending.
    fn list(&self) -> Result<Vec<MatchId>>;
}

/// Append-only persistence for per-match combat logs.
///
/// Entries must arrive in sequence order starting at 0; implementations
/// reject gaps and repeats with [`RepositoryError::SequenceGap`].
///
/// [`RepositoryError::SequenceGap`]: super::RepositoryError::SequenceGap
pub trait LogRepository: Send + Sync {
    /// Durably appends one entry. Returns only after the entry is persisted.
    fn append(&self, match_id: MatchId, entry: &LogEntry) -> Result<()>;

    /// Full ordered log; empty if the match never logged anything.
    fn load(&self, match_id: MatchId) -> Result<Vec<LogEntry>>;

    /// Releases whatever is held open for a finished log. A later append
    /// reopens it.
    fn seal(&self, _match_id: MatchId) -> Result<()> {
        Ok(())
    }
}
