//! Wall-clock timestamps anchored to the tokio clock.
//!
//! Deadlines are scheduled on [`tokio::time::Instant`] and recorded as
//! [`Timestamp`]s. Both derive from one anchor, so pausing or advancing tokio
//! time in tests moves recorded timestamps with it.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

use combat_core::Timestamp;

#[derive(Clone, Copy, Debug)]
pub struct MatchClock {
    anchor: Instant,
    origin: Timestamp,
}

impl MatchClock {
    /// Anchors the clock at the current system time.
    pub fn system() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default();
        Self::starting_at(Timestamp::from_millis(millis))
    }

    /// Anchors the clock so that "now" reads as `origin`.
    pub fn starting_at(origin: Timestamp) -> Self {
        Self {
            anchor: Instant::now(),
            origin,
        }
    }

    pub fn now(&self) -> Timestamp {
        let elapsed = self.anchor.elapsed().as_millis() as u64;
        self.origin.saturating_add_millis(elapsed)
    }

    /// Tokio instant at which `at` is reached. Past timestamps map to the anchor.
    pub fn instant_at(&self, at: Timestamp) -> Instant {
        self.anchor + Duration::from_millis(at.millis_since(self.origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let clock = MatchClock::starting_at(Timestamp(10_000));
        assert_eq!(clock.now(), Timestamp(10_000));

        tokio::time::advance(Duration::from_millis(2_500)).await;
        assert_eq!(clock.now(), Timestamp(12_500));

        let deadline = clock.instant_at(Timestamp(70_000));
        assert_eq!(deadline - clock.instant_at(Timestamp(10_000)), Duration::from_secs(60));
    }
}
