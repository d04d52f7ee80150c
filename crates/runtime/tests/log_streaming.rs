mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arena_runtime::{
    CombatEngine, EngineConfig, Gateway, Identity, InMemoryMatchRepository, MatchRepository,
    RepositoryError, SameWorldSpectators, StaticIdentityResolver,
};
use combat_core::{AcceptanceResponse, CombatMatch, ErrorKind, MatchId, MatchStatus, is_gap_free};

use common::{arenas, drain, engine, engine_with, pid, pit, roster};

async fn start_paced_match(engine: &CombatEngine, seed: u64) -> MatchId {
    let record = engine
        .pair_with_seed(pid("alpha"), pid("beta"), &pit(), seed)
        .await
        .expect("pairing should succeed");
    for participant in ["alpha", "beta"] {
        engine
            .respond(record.id, &pid(participant), AcceptanceResponse::Accept)
            .await
            .expect("accept");
    }
    record.id
}

#[tokio::test(start_paused = true)]
async fn mid_match_watcher_sees_history_then_tail_without_gaps() {
    let engine = engine_with(EngineConfig::default(), roster());
    let match_id = start_paced_match(&engine, 99).await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    let mut subscription = engine
        .watch(match_id, &Identity::player("alpha", "gaul"))
        .await
        .expect("participant may watch");
    let joined_at = subscription.history.len();
    assert!(joined_at > 0);
    assert_eq!(subscription.stream.next_sequence() as usize, joined_at);

    let (tail, terminal) = drain(&mut subscription).await;
    assert_eq!(terminal, Some(MatchStatus::Completed));
    assert_eq!(tail.first().map(|entry| entry.sequence as usize), Some(joined_at));

    let mut full = subscription.history.clone();
    full.extend(tail);
    assert!(is_gap_free(&full));

    // Closure is reported once; the stream stays finished.
    assert!(subscription.stream.next().await.is_none());
    assert!(subscription.stream.next().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_watchers_agree_and_disconnects_are_local() {
    let engine = engine_with(EngineConfig::default(), roster());
    let match_id = start_paced_match(&engine, 5).await;
    let operator = Identity::operator("ops", "gaul");

    let early = engine.watch(match_id, &operator).await.expect("watch");
    let dropped = engine.watch(match_id, &operator).await.expect("watch");
    drop(dropped);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let late = engine.watch(match_id, &operator).await.expect("watch");

    let collect = |mut subscription: arena_runtime::Subscription| async move {
        let (tail, terminal) = drain(&mut subscription).await;
        let mut full = subscription.history;
        full.extend(tail);
        (full, terminal)
    };
    let ((early_log, early_end), (late_log, late_end)) =
        tokio::join!(collect(early), collect(late));

    assert_eq!(early_log, late_log);
    assert!(is_gap_free(&early_log));
    assert_eq!(early_end, Some(MatchStatus::Completed));
    assert_eq!(late_end, Some(MatchStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn spectators_follow_the_access_policy() {
    let engine = CombatEngine::builder()
        .config(EngineConfig::default().with_pacing(false))
        .shared_roster(roster())
        .arenas(arenas())
        .access_policy(SameWorldSpectators)
        .build()
        .expect("engine should build");
    let record = engine
        .pair_with_seed(pid("alpha"), pid("beta"), &pit(), 4)
        .await
        .expect("pairing should succeed");

    assert!(
        engine
            .watch(record.id, &Identity::player("carol", "gaul"))
            .await
            .is_ok()
    );
    let err = engine
        .watch(record.id, &Identity::player("carol", "egypt"))
        .await
        .expect_err("foreign spectator");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

fn gateway(engine: CombatEngine) -> Gateway {
    let resolver = StaticIdentityResolver::new()
        .with("alpha-token", Identity::player("alpha", "gaul"))
        .with("beta-token", Identity::player("beta", "gaul"))
        .with("mallory-token", Identity::player("mallory", "gaul"))
        .with("stale-token", Identity::player("alpha", "egypt"))
        .with("ops-token", Identity::operator("ops", "rome"));
    Gateway::new(Arc::new(engine), Arc::new(resolver))
}

#[tokio::test(start_paused = true)]
async fn gateway_maps_callers_to_errors() {
    let (engine, _roster) = engine();
    let gateway = gateway(engine);
    let record = gateway
        .engine()
        .pair_with_seed(pid("alpha"), pid("beta"), &pit(), 21)
        .await
        .expect("pairing should succeed");

    let err = gateway
        .status("forged", record.id)
        .await
        .expect_err("unknown credential");
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = gateway
        .status("alpha-token", MatchId(404))
        .await
        .expect_err("unknown match");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = gateway
        .status("mallory-token", record.id)
        .await
        .expect_err("not a participant");
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = gateway
        .watch("mallory-token", record.id)
        .await
        .expect_err("not a participant");
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let err = gateway
        .status("stale-token", record.id)
        .await
        .expect_err("caller on another world");
    assert_eq!(err.kind(), ErrorKind::Integrity);

    let err = gateway
        .resolve_config("alpha-token", &"atlantis".into())
        .await
        .expect_err("unknown arena");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let config = gateway
        .resolve_config("alpha-token", &"colosseum".into())
        .await
        .expect("known arena");
    assert!(config.death_chance_percent > 0);

    let summary = gateway
        .status("ops-token", record.id)
        .await
        .expect("operators see every match");
    assert_eq!(summary.status, MatchStatus::PendingAcceptance);
    assert_eq!(summary.winner_id, None);
}

#[tokio::test(start_paused = true)]
async fn gateway_drives_a_match_end_to_end() {
    let (engine, _roster) = engine();
    let gateway = gateway(engine);
    let record = gateway
        .engine()
        .pair_with_seed(pid("alpha"), pid("beta"), &pit(), 31)
        .await
        .expect("pairing should succeed");

    let mut subscription = gateway
        .watch("beta-token", record.id)
        .await
        .expect("participant may watch");

    gateway
        .respond("alpha-token", record.id, AcceptanceResponse::Accept)
        .await
        .expect("alpha accepts");
    let outcome = gateway
        .respond("beta-token", record.id, AcceptanceResponse::Accept)
        .await
        .expect("beta accepts");
    assert!(outcome.resolution.is_some_and(|r| r.is_proceed()));

    let (_, terminal) = drain(&mut subscription).await;
    assert_eq!(terminal, Some(MatchStatus::Completed));

    let summary = gateway
        .status("alpha-token", record.id)
        .await
        .expect("status");
    assert_eq!(summary.status, MatchStatus::Completed);
    assert!(summary.winner_method.is_some());

    let err = gateway
        .force_complete(
            "beta-token",
            record.id,
            pid("beta"),
            combat_core::WinMethod::Technical,
            "please",
        )
        .await
        .expect_err("players cannot force");
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

/// Serves one stale copy of a record, as if it was read just before the
/// match finished.
#[derive(Default)]
struct StaleOnce {
    inner: InMemoryMatchRepository,
    stale: Mutex<Option<CombatMatch>>,
}

impl MatchRepository for StaleOnce {
    fn save(&self, record: &CombatMatch) -> Result<(), RepositoryError> {
        self.inner.save(record)
    }

    fn load(&self, id: MatchId) -> Result<Option<CombatMatch>, RepositoryError> {
        let mut stale = self.stale.lock().map_err(|_| RepositoryError::LockPoisoned)?;
        if stale.as_ref().is_some_and(|record| record.id == id) {
            return Ok(stale.take());
        }
        self.inner.load(id)
    }

    fn list(&self) -> Result<Vec<MatchId>, RepositoryError> {
        self.inner.list()
    }
}

#[tokio::test(start_paused = true)]
async fn watcher_racing_the_close_still_gets_the_terminal_status() {
    let matches = Arc::new(StaleOnce::default());
    let engine = CombatEngine::builder()
        .config(EngineConfig::default().with_pacing(false))
        .shared_roster(roster())
        .arenas(arenas())
        .match_repository(matches.clone())
        .build()
        .expect("engine should build");
    let operator = Identity::operator("ops", "gaul");

    let match_id = start_paced_match(&engine, 17).await;
    let mut live = engine.watch(match_id, &operator).await.expect("watch");
    let (_, terminal) = drain(&mut live).await;
    assert_eq!(terminal, Some(MatchStatus::Completed));

    let mut before_close = engine.record(match_id).await.expect("record");
    before_close.status = MatchStatus::Ongoing;
    *matches.stale.lock().expect("stale slot") = Some(before_close);

    let mut replay = engine.watch(match_id, &operator).await.expect("replay");
    assert_eq!(replay.stream.terminal_status(), Some(MatchStatus::Completed));
    assert!(replay.stream.next().await.is_none());
}
