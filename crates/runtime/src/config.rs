//! Engine configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime knobs shared by the engine and its per-match tasks.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Time both participants have to respond after pairing.
    pub acceptance_window_secs: u64,
    /// Live-channel capacity per match broadcaster.
    pub broadcast_capacity: usize,
    /// Command queue size per acceptance coordinator.
    pub command_buffer: usize,
    /// Release log entries at the configured action interval. Disable for
    /// demos and tests that only care about the final log.
    pub pace_log: bool,
    /// Root for file-backed repositories; in-memory when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acceptance_window_secs: 60,
            broadcast_capacity: 64,
            command_buffer: 16,
            pace_log: true,
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `ARENA_ACCEPTANCE_WINDOW_SECS` - Acceptance window (default: 60)
    /// - `ARENA_BROADCAST_CAPACITY` - Live log channel capacity (default: 64)
    /// - `ARENA_COMMAND_BUFFER` - Coordinator command queue size (default: 16)
    /// - `ARENA_PACE_LOG` - Pace log release at the action interval (default: true)
    /// - `ARENA_DATA_DIR` - Directory for match records and logs (default: in-memory)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_env::<u64>("ARENA_ACCEPTANCE_WINDOW_SECS") {
            config.acceptance_window_secs = secs.max(1);
        }

        if let Some(capacity) = read_env::<usize>("ARENA_BROADCAST_CAPACITY") {
            config.broadcast_capacity = capacity.max(1);
        }

        if let Some(capacity) = read_env::<usize>("ARENA_COMMAND_BUFFER") {
            config.command_buffer = capacity.max(1);
        }

        if let Some(pace) = read_env::<bool>("ARENA_PACE_LOG") {
            config.pace_log = pace;
        }

        config.data_dir = env::var("ARENA_DATA_DIR").ok().map(PathBuf::from);

        config
    }

    pub fn acceptance_window(&self) -> Duration {
        Duration::from_secs(self.acceptance_window_secs)
    }

    pub fn with_acceptance_window_secs(mut self, secs: u64) -> Self {
        self.acceptance_window_secs = secs.max(1);
        self
    }

    pub fn with_pacing(mut self, pace_log: bool) -> Self {
        self.pace_log = pace_log;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.acceptance_window(), Duration::from_secs(60));
        assert!(config.pace_log);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn builders_clamp_window() {
        let config = EngineConfig::default()
            .with_acceptance_window_secs(0)
            .with_pacing(false)
            .with_data_dir("/tmp/arena");
        assert_eq!(config.acceptance_window_secs, 1);
        assert!(!config.pace_log);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/arena")));
    }
}
