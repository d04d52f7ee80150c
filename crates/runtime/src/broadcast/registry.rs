use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use combat_core::MatchId;

use super::LogBroadcaster;
use crate::repository::LogRepository;

/// Live broadcasters keyed by match id.
#[derive(Default)]
pub struct BroadcastRegistry {
    broadcasters: RwLock<HashMap<MatchId, Arc<LogBroadcaster>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the broadcaster for `match_id`, creating it if absent.
    pub async fn open(
        &self,
        match_id: MatchId,
        logs: Arc<dyn LogRepository>,
        capacity: usize,
    ) -> Arc<LogBroadcaster> {
        let mut broadcasters = self.broadcasters.write().await;

        broadcasters
            .entry(match_id)
            .or_insert_with(|| Arc::new(LogBroadcaster::new(match_id, logs, capacity)))
            .clone()
    }

    pub async fn get(&self, match_id: MatchId) -> Option<Arc<LogBroadcaster>> {
        self.broadcasters
            .read()
            .await
            .get(&match_id)
            .cloned()
    }

    /// Tears down a match's broadcaster. Existing subscribers keep their
    /// handle and still drain to the end.
    pub async fn remove(&self, match_id: MatchId) -> Option<Arc<LogBroadcaster>> {
        self.broadcasters
            .write()
            .await
            .remove(&match_id)
    }

    pub async fn len(&self) -> usize {
        self.broadcasters
            .read()
            .await
            .len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryLogRepository;

    #[tokio::test]
    async fn open_is_get_or_create() {
        let registry = BroadcastRegistry::new();
        let logs: Arc<dyn LogRepository> = Arc::new(InMemoryLogRepository::new());

        let first = registry.open(MatchId(1), logs.clone(), 8).await;
        let again = registry.open(MatchId(1), logs.clone(), 8).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(MatchId(1)).await.is_some());
        assert!(registry.get(MatchId(1)).await.is_none());
        assert!(registry.is_empty().await);
    }
}
