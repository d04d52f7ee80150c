//! Arena demo binary.
//!
//! Pairs two fighters from an in-memory roster, accepts on both sides and
//! tails the combat log to stdout until the match is over.
//!
//! Environment variables (besides the `ARENA_*` engine settings):
//! - `ARENA_DEMO_ARENA` - `pit` (no deaths, default) or `colosseum`
//! - `ARENA_DEMO_SEED` - fixed match seed; random when unset
//! - `ARENA_PERSIST` - store matches under the platform data directory
//! - `ARENA_LOG_DIR` - also write logs to `<dir>/arena.log`
//! - `RUST_LOG` - log filter (default: info)

mod logging;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use arena_runtime::{
    CombatEngine, EngineConfig, Identity, InMemoryArenaDirectory, InMemoryRoster,
};
use combat_core::{
    AcceptanceResponse, Arena, ArenaId, CombatantStats, LogEntry, ParticipantId,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = logging::setup_logging()?;

    let mut config = EngineConfig::from_env();
    if config.data_dir.is_none() && std::env::var_os("ARENA_PERSIST").is_some() {
        config.data_dir = Some(default_data_dir()?);
    }

    info!(
        acceptance_window_secs = config.acceptance_window_secs,
        pace_log = config.pace_log,
        data_dir = ?config.data_dir,
        "starting arena demo"
    );

    let engine = CombatEngine::builder()
        .config(config)
        .roster(
            InMemoryRoster::new()
                .with("ajax", "olympus", CombatantStats::new(100, 14, 5, 8))
                .with("hector", "olympus", CombatantStats::new(110, 12, 7, 11)),
        )
        .arenas(
            InMemoryArenaDirectory::new()
                .with(Arena::new("pit", "The Pit", false))
                .with(Arena::new("colosseum", "The Colosseum", true)),
        )
        .build()?;

    let arena = ArenaId::new(std::env::var("ARENA_DEMO_ARENA").unwrap_or_else(|_| "pit".into()));
    let config = engine.resolve_config(&arena).await?;
    println!(
        "{arena}: {} actions max, {}s apart, death {}%, injury {}%",
        config.max_actions,
        config.action_interval_seconds,
        config.death_chance_percent,
        config.injury_chance_percent
    );

    let (ajax, hector) = (ParticipantId::new("ajax"), ParticipantId::new("hector"));
    let record = match std::env::var("ARENA_DEMO_SEED") {
        Ok(seed) => {
            let seed = seed.parse().context("ARENA_DEMO_SEED must be a u64")?;
            engine
                .pair_with_seed(ajax.clone(), hector.clone(), &arena, seed)
                .await?
        }
        Err(_) => engine.pair(ajax.clone(), hector.clone(), &arena).await?,
    };
    println!("{} paired, seed {}", record.id, record.seed);

    let referee = Identity::operator("referee", "olympus");
    let mut subscription = engine.watch(record.id, &referee).await?;

    for participant in [&ajax, &hector] {
        engine
            .respond(record.id, participant, AcceptanceResponse::Accept)
            .await?;
    }

    for entry in &subscription.history {
        print_entry(entry);
    }
    while let Some(entry) = subscription.stream.next().await {
        print_entry(&entry);
    }

    let summary = engine.status(record.id, &referee).await?;
    match (summary.winner_id, summary.winner_method) {
        (Some(winner), Some(method)) => println!("{} by {method}", winner),
        _ => println!("match ended {}", summary.status),
    }

    if let Ok(report) = engine.audit(record.id).await {
        println!(
            "audit: {} ({} entries, digest {})",
            if report.is_consistent() { "ok" } else { "MISMATCH" },
            report.recorded_entries,
            report.recorded_digest
        );
    }

    engine.shutdown().await?;
    Ok(())
}

fn print_entry(entry: &LogEntry) {
    println!(
        "[{:>3}s] #{:<3} {}",
        entry.offset_ms / 1_000,
        entry.sequence,
        entry.narration
    );
}

fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "arena")
        .context("could not determine a home directory for ARENA_PERSIST")?;
    Ok(dirs.data_dir().to_path_buf())
}
