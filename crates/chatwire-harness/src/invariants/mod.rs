//! Session invariants checked against simulated clients.
//!
//! A scenario test pins down one path through the system. An invariant is a
//! property of every path: no message on screen twice, no connection left
//! open, no direct conversation leaking a third party. The harness copies
//! what each client shows into a [`SystemSnapshot`] and runs every
//! registered [`Invariant`] over it. [`crate::SimDriver`] does this on each
//! render, so a violation fails the step that caused it.
//!
//! ```ignore
//! let snapshot = SystemSnapshot::single(driver.snapshot(app));
//! InvariantRegistry::standard().check_all(&snapshot)?;
//! ```

use std::fmt;

mod checks;
mod snapshot;

pub use checks::{
    ConnectionBalance, DirectPeerBound, EchoesSuppressed, StatusMatchesTransport,
    TranscriptAppendOnly, UniqueEntries,
};
pub use snapshot::{ClientSnapshot, MessageSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// [`Invariant::name`] of the failed check
    pub invariant: &'static str,
    /// Which client and which entry broke it
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property every snapshot must satisfy.
pub trait Invariant: Send + Sync {
    /// Stable snake_case name, used in violation reports.
    fn name(&self) -> &'static str;

    /// Check one snapshot. Reports the first offending client.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of invariants run together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// No invariants.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// The session invariants, in report order:
    ///
    /// - [`UniqueEntries`]: no entry is shown twice
    /// - [`TranscriptAppendOnly`]: the transcript never shrinks
    /// - [`ConnectionBalance`]: every connect is closed exactly once
    /// - [`StatusMatchesTransport`]: a live status implies an open transport
    /// - [`EchoesSuppressed`]: echoes confirm instead of duplicating
    /// - [`DirectPeerBound`]: direct conversations stay between two users
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UniqueEntries);
        registry.add(TranscriptAppendOnly);
        registry.add(ConnectionBalance);
        registry.add(StatusMatchesTransport);
        registry.add(EchoesSuppressed);
        registry.add(DirectPeerBound);
        registry
    }

    /// Append an invariant. Checks run in insertion order.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every check and collect all violations, in registry order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        for invariant in &self.invariants {
            if let Err(violation) = invariant.check(state) {
                violations.push(violation);
            }
        }
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Panic with every violation, labelled with `context`.
    #[allow(clippy::panic, reason = "assertion helper for tests")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("{context}: {} invariant(s) violated\n  {}", lines.len(), lines.join("\n  "));
        }
    }

    /// Registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
