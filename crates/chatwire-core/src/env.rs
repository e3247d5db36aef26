//! Environment abstraction for deterministic testing.
//!
//! Decouples session logic from system resources (monotonic time, wall-clock
//! time, sleeping). Production drivers use the system clocks; the simulation
//! harness substitutes a virtual clock it advances explicitly.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Abstract environment providing time and async primitives.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `wall_clock()` is only used to stamp outgoing messages, never to order
///   or expire state
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, while simulation
    /// environments use virtual time.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// Drives handshake timeouts and the echo suppression window.
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time, used for message timestamps.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (not session logic).
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
