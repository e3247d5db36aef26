//! Virtual clock environment.
//!
//! [`SimEnv`] implements [`Environment`] over a shared counter that only moves
//! when a test advances it. Cloning a `SimEnv` shares the clock, so a driver
//! and the session it feeds always agree on the time.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chatwire_client::Environment;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};

/// Wall-clock reading at virtual time zero: 2024-05-01 12:00:00 UTC.
const EPOCH_SECS: i64 = 1_714_564_800;

/// Deterministic environment with manually advanced time.
///
/// Monotonic time is a [`Duration`] since the simulation started. Wall-clock
/// time is a fixed base plus the same offset.
#[derive(Debug, Clone, Default)]
pub struct SimEnv {
    elapsed: Arc<Mutex<Duration>>,
}

impl SimEnv {
    /// Create an environment at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(PoisonError::into_inner);
        *elapsed += by;
    }

    /// Time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn base() -> DateTime<Utc> {
        Utc.timestamp_opt(EPOCH_SECS, 0).single().unwrap_or_default()
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.elapsed()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        let offset = TimeDelta::from_std(self.elapsed()).unwrap_or(TimeDelta::MAX);
        Self::base().checked_add_signed(offset).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Sleeping advances the virtual clock and completes immediately.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.advance(duration);
        async {}
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    #[test]
    fn clones_share_the_clock() {
        let env = SimEnv::new();
        let other = env.clone();

        env.advance(Duration::from_secs(3));
        assert_eq!(other.now(), Duration::from_secs(3));
    }

    #[test]
    fn wall_clock_follows_virtual_time() {
        let env = SimEnv::new();
        assert_eq!((env.wall_clock().hour(), env.wall_clock().minute()), (12, 0));

        env.advance(Duration::from_secs(90 * 60));
        assert_eq!((env.wall_clock().hour(), env.wall_clock().minute()), (13, 30));
    }

    #[tokio::test]
    async fn sleep_advances_without_waiting() {
        let env = SimEnv::new();
        env.sleep(Duration::from_secs(60)).await;
        assert_eq!(env.now(), Duration::from_secs(60));
    }
}
