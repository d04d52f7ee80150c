#![allow(dead_code)]

use std::sync::Arc;

use arena_runtime::{
    CombatEngine, EngineConfig, InMemoryArenaDirectory, InMemoryRoster, Subscription,
};
use combat_core::{Arena, ArenaId, CombatantStats, LogEntry, MatchStatus, ParticipantId};

pub const PIT: &str = "pit";
pub const COLOSSEUM: &str = "colosseum";

pub fn pid(id: &str) -> ParticipantId {
    ParticipantId::from(id)
}

pub fn pit() -> ArenaId {
    ArenaId::new(PIT)
}

/// Alpha and beta on gaul, carol on egypt.
pub fn roster() -> Arc<InMemoryRoster> {
    Arc::new(
        InMemoryRoster::new()
            .with("alpha", "gaul", CombatantStats::default())
            .with("beta", "gaul", CombatantStats::new(110, 11, 7, 9))
            .with("carol", "egypt", CombatantStats::default()),
    )
}

pub fn arenas() -> InMemoryArenaDirectory {
    InMemoryArenaDirectory::new()
        .with(Arena::new(PIT, "The Pit", false))
        .with(Arena::new(COLOSSEUM, "The Colosseum", true))
}

pub fn engine_with(config: EngineConfig, roster: Arc<InMemoryRoster>) -> CombatEngine {
    CombatEngine::builder()
        .config(config)
        .shared_roster(roster)
        .arenas(arenas())
        .build()
        .expect("engine should build")
}

/// Unpaced engine over the default roster.
pub fn engine() -> (CombatEngine, Arc<InMemoryRoster>) {
    let roster = roster();
    let engine = engine_with(EngineConfig::default().with_pacing(false), roster.clone());
    (engine, roster)
}

/// Drains a subscription's live tail until the match is terminal.
pub async fn drain(subscription: &mut Subscription) -> (Vec<LogEntry>, Option<MatchStatus>) {
    let mut entries = Vec::new();
    while let Some(entry) = subscription.stream.next().await {
        entries.push(entry);
    }
    (entries, subscription.stream.terminal_status())
}
