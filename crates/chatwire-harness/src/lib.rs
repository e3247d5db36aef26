//! Deterministic simulation harness for chatwire session testing.
//!
//! Runs the production [`chatwire_app::Runtime`] against an in-process copy
//! of the relay, with a virtual clock and injectable faults. Nothing touches
//! the network or the system clock, so every run of a scenario produces the
//! same sequence of events.
//!
//! # Components
//!
//! - [`SimEnv`]: virtual clock implementing the session environment
//! - [`SimServer`]: the relay state machine with per-session mailboxes
//! - [`SimDriver`]: [`chatwire_app::Driver`] over a `SimServer`, with fault
//!   injection (refused connects, failed sends, dropped replies, broken or
//!   server-closed connections)
//! - [`SimClient`]: step-wise runtime wrapper for multi-client scenarios
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the session
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ClientSnapshot, ConnectionBalance, DirectPeerBound, EchoesSuppressed, Invariant,
    InvariantRegistry, InvariantResult, MessageSnapshot, StatusMatchesTransport, SystemSnapshot,
    TranscriptAppendOnly, UniqueEntries, Violation,
};
pub use scenario::{SIM_ENDPOINT, SimClient};
pub use sim_driver::{DriverStats, SimDriver, SimError};
pub use sim_env::SimEnv;
pub use sim_server::{SharedSimServer, SimServer, create_shared_server};
