//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the terminal driver but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`chatwire_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Events are produced in a fixed priority order: injected faults first, then
//! mail from the [`SimServer`](crate::SimServer), then scripted input, then
//! idle ticks that advance the virtual clock. Once all of those are exhausted
//! the driver reports that input closed.

use std::{
    collections::VecDeque,
    future::Future,
    sync::{MutexGuard, PoisonError},
    time::Duration,
};

use chatwire_app::{App, Driver, DriverEvent};
use chatwire_client::Environment;

use crate::{
    SimEnv,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
    sim_server::{SharedSimServer, SimServer},
};

/// Default virtual time between idle ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Error type for simulation driver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SimError {
    /// A connect attempt was refused by fault injection.
    #[error("connection to {endpoint} refused")]
    ConnectionRefused {
        /// Endpoint the runtime asked for
        endpoint: String,
    },

    /// A frame was sent without an open connection.
    #[error("not connected")]
    NotConnected,

    /// A send failed by fault injection.
    #[error("send failed: {reason}")]
    SendFailed {
        /// Injected reason
        reason: String,
    },

    /// Invariants failed after a render.
    #[error("invariants violated at render {render}: {}", join(.violations))]
    InvariantViolated {
        /// Render count when the check ran
        render: usize,
        /// Every failed check
        violations: Vec<Violation>,
    },
}

fn join(violations: &[Violation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Counters of what the runtime asked the driver to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Successful connects.
    pub connects: usize,
    /// Connect attempts refused by fault injection.
    pub refused: usize,
    /// Closes of an open connection.
    pub closes: usize,
    /// Frames handed to the server.
    pub frames_sent: usize,
    /// Render calls.
    pub renders: usize,
}

/// Simulation driver for deterministic testing.
///
/// Implements [`Driver`] so the same [`chatwire_app::Runtime`] orchestration
/// code runs in both the terminal client and simulation tests.
pub struct SimDriver {
    server: SharedSimServer,
    env: SimEnv,
    session: Option<u64>,
    input: VecDeque<String>,
    injected: VecDeque<DriverEvent>,
    refuse_connects: usize,
    send_failure: Option<String>,
    mute_inbound: bool,
    idle_ticks: usize,
    tick_interval: Duration,
    transcript_history: Vec<usize>,
    stats: DriverStats,
    invariants: Option<InvariantRegistry>,
    name: String,
}

impl SimDriver {
    /// Create a driver connected to `server` and sharing `env`'s clock.
    pub fn new(name: impl Into<String>, server: SharedSimServer, env: SimEnv) -> Self {
        Self {
            server,
            env,
            session: None,
            input: VecDeque::new(),
            injected: VecDeque::new(),
            refuse_connects: 0,
            send_failure: None,
            mute_inbound: false,
            idle_ticks: 0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            transcript_history: Vec::new(),
            stats: DriverStats::default(),
            invariants: None,
            name: name.into(),
        }
    }

    /// Enable invariant checking on every render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(registry);
        self
    }

    /// Queue input lines.
    #[must_use]
    pub fn with_input<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Emit `count` ticks, `interval` apart, once everything else is drained.
    #[must_use]
    pub fn with_idle_ticks(mut self, count: usize, interval: Duration) -> Self {
        self.idle_ticks = count;
        self.tick_interval = interval;
        self
    }

    /// Queue one input line.
    pub fn push_input(&mut self, line: impl Into<String>) {
        self.input.push_back(line.into());
    }

    /// Queue a tick after advancing the virtual clock by `by`.
    ///
    /// The clock moves when the tick is delivered, not when it is queued.
    pub fn push_tick(&mut self, by: Duration) {
        self.idle_ticks += 1;
        self.tick_interval = by;
    }

    /// Break the connection. The runtime sees the failure before anything
    /// else.
    pub fn inject_transport_failure(&mut self, cause: impl Into<String>) {
        self.injected.push_back(DriverEvent::TransportFailed { cause: cause.into() });
    }

    /// Have the server close the connection.
    pub fn kick(&mut self, reason: &str) {
        if let Some(session) = self.session {
            self.lock_server().kick(session, reason);
        }
    }

    /// Refuse the next `count` connect attempts.
    pub fn refuse_connects(&mut self, count: usize) {
        self.refuse_connects = count;
    }

    /// Fail every send until cleared with `None`.
    pub fn fail_sends(&mut self, reason: Option<&str>) {
        self.send_failure = reason.map(str::to_string);
    }

    /// Drop (or resume delivering) everything the server sends this client.
    ///
    /// Applies to the current connection and to later ones.
    pub fn mute_inbound(&mut self, muted: bool) {
        self.mute_inbound = muted;
        if let Some(session) = self.session {
            self.lock_server().set_muted(session, muted);
        }
    }

    /// Whether the driver would produce an event other than an idle tick or
    /// end of input.
    pub fn has_pending(&self) -> bool {
        let mail = self.session.is_some_and(|session| self.lock_server().has_mail(session));
        !self.injected.is_empty() || mail || !self.input.is_empty()
    }

    /// Whether a tick is queued.
    pub fn has_ticks(&self) -> bool {
        self.idle_ticks > 0
    }

    /// Server session id of the open connection.
    pub fn session(&self) -> Option<u64> {
        self.session
    }

    /// Counters so far.
    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// The shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Capture the observable state of this client.
    pub fn snapshot(&self, app: &App) -> ClientSnapshot {
        let mut snapshot = ClientSnapshot::from_app(&self.name, app).with_connections(
            self.stats.connects,
            self.stats.closes,
            self.session.is_some(),
        );
        snapshot.transcript_history.clone_from(&self.transcript_history);
        snapshot
    }

    fn lock_server(&self) -> MutexGuard<'_, SimServer> {
        self.server.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&mut self) -> DriverEvent {
        if let Some(event) = self.injected.pop_front() {
            return event;
        }

        if let Some(session) = self.session
            && let Some(event) = self.lock_server().take_delivery(session)
        {
            return event;
        }

        if let Some(line) = self.input.pop_front() {
            return DriverEvent::Input(line);
        }

        if self.idle_ticks > 0 {
            self.idle_ticks -= 1;
            self.env.advance(self.tick_interval);
            return DriverEvent::Tick;
        }

        DriverEvent::InputClosed
    }

    fn open(&mut self, endpoint: &str) -> Result<(), SimError> {
        if self.refuse_connects > 0 {
            self.refuse_connects -= 1;
            self.stats.refused += 1;
            return Err(SimError::ConnectionRefused { endpoint: endpoint.to_string() });
        }

        let mut server = self.lock_server();
        let session = server.accept();
        server.set_muted(session, self.mute_inbound);
        drop(server);

        tracing::debug!(client = %self.name, session, "sim connect");
        self.session = Some(session);
        self.stats.connects += 1;
        Ok(())
    }

    fn send(&mut self, frame: String) -> Result<(), SimError> {
        if let Some(reason) = &self.send_failure {
            return Err(SimError::SendFailed { reason: reason.clone() });
        }
        let session = self.session.ok_or(SimError::NotConnected)?;

        self.lock_server().receive(session, frame);
        self.stats.frames_sent += 1;
        Ok(())
    }

    fn check_invariants(&self, app: &App) -> Result<(), SimError> {
        let Some(registry) = &self.invariants else {
            return Ok(());
        };
        let snapshot = SystemSnapshot::single(self.snapshot(app));
        registry.check_all(&snapshot).map_err(|violations| SimError::InvariantViolated {
            render: self.stats.renders,
            violations,
        })
    }
}

impl Driver for SimDriver {
    type Error = SimError;
    type Instant = Duration;

    fn next_event(&mut self) -> impl Future<Output = Result<DriverEvent, SimError>> + Send {
        let event = self.next();
        async move { Ok(event) }
    }

    fn connect(&mut self, endpoint: &str) -> impl Future<Output = Result<(), SimError>> + Send {
        let result = self.open(endpoint);
        async move { result }
    }

    fn send_frame(&mut self, frame: String) -> impl Future<Output = Result<(), SimError>> + Send {
        let result = self.send(frame);
        async move { result }
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!(client = %self.name, session, "sim close");
            self.lock_server().disconnect(session, "closed by client");
            self.stats.closes += 1;
        }
    }

    fn now(&self) -> Duration {
        self.env.now()
    }

    fn render(&mut self, app: &App) -> Result<(), SimError> {
        self.stats.renders += 1;
        self.transcript_history.push(app.transcript().len());
        self.check_invariants(app)
    }
}
