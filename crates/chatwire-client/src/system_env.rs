//! Production Environment implementation using the system clocks.
//!
//! `SystemEnv` reads `std::time::Instant` for monotonic time, the system
//! wall clock for message timestamps, and sleeps on the tokio timer. Behavior
//! is therefore non-deterministic; the simulation harness supplies its own
//! environment for reproducible runs.

use std::time::Duration;

use chatwire_core::Environment;
use chrono::{DateTime, Utc};

/// Production environment using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_is_non_decreasing() {
        let env = SystemEnv::new();
        let earlier = env.now();
        assert!(env.now() >= earlier);
    }

    #[test]
    fn wall_clock_tracks_utc_now() {
        let before = Utc::now();
        let stamped = SystemEnv::new().wall_clock();
        assert!(stamped >= before);
        assert!(stamped - before < chrono::TimeDelta::seconds(1));
    }

    #[tokio::test]
    async fn sleep_waits_on_the_tokio_timer() {
        let env = SystemEnv::new();
        let start = env.now();
        env.sleep(Duration::from_millis(20)).await;
        assert!(env.now() - start >= Duration::from_millis(20));
    }
}
