//! Step-wise drivers for multi-client scenarios.
//!
//! [`chatwire_app::Runtime::run`] owns its loop until input ends, which suits
//! a single scripted client. Conversations between clients need the test to
//! interleave them, so [`SimClient`] steps one runtime at a time and stops
//! when its driver has nothing left to deliver.

use std::time::Duration;

use chatwire_app::{App, Driver, Runtime};
use chatwire_client::SessionConfig;

use crate::{
    SharedSimServer, SimDriver, SimEnv,
    invariants::{ClientSnapshot, InvariantRegistry},
    sim_driver::SimError,
};

/// Endpoint reported to simulated apps.
pub const SIM_ENDPOINT: &str = "sim://relay";

/// One simulated user: an App, a Bridge and a [`SimDriver`] behind a Runtime.
pub struct SimClient {
    runtime: Runtime<SimDriver, SimEnv>,
    quit: bool,
}

impl SimClient {
    /// Create a client with the default session configuration and the
    /// standard invariants checked on every render.
    pub fn new(name: &str, server: &SharedSimServer, env: &SimEnv) -> Self {
        Self::with_config(name, server, env, SessionConfig::default())
    }

    /// Create a client with a custom session configuration.
    pub fn with_config(
        name: &str,
        server: &SharedSimServer,
        env: &SimEnv,
        config: SessionConfig,
    ) -> Self {
        let driver = SimDriver::new(name, server.clone(), env.clone())
            .with_invariants(InvariantRegistry::standard());
        let runtime = Runtime::new(driver, env.clone(), config, SIM_ENDPOINT);
        Self { runtime, quit: false }
    }

    /// Type a line and process everything it causes.
    pub async fn input(&mut self, line: &str) -> Result<(), SimError> {
        self.runtime.driver_mut().push_input(line);
        self.settle().await
    }

    /// Advance the clock by `by`, deliver one tick, then settle.
    pub async fn tick(&mut self, by: Duration) -> Result<(), SimError> {
        self.runtime.driver_mut().push_tick(by);
        self.step().await?;
        self.settle().await
    }

    /// Process events until the driver has nothing pending.
    ///
    /// Queued idle ticks are left alone.
    pub async fn settle(&mut self) -> Result<(), SimError> {
        while !self.quit && self.runtime.driver().has_pending() {
            self.step().await?;
        }
        Ok(())
    }

    async fn step(&mut self) -> Result<(), SimError> {
        let event = self.runtime.driver_mut().next_event().await?;
        if self.runtime.process_driver_event(event).await? {
            self.quit = true;
            self.runtime.shutdown();
        }
        Ok(())
    }

    /// Close the connection, as the runtime does on exit.
    pub fn shutdown(&mut self) {
        self.runtime.shutdown();
    }

    /// Whether the user quit.
    pub fn has_quit(&self) -> bool {
        self.quit
    }

    /// Application state.
    pub fn app(&self) -> &App {
        self.runtime.app()
    }

    /// The simulation driver.
    pub fn driver(&self) -> &SimDriver {
        self.runtime.driver()
    }

    /// The simulation driver, for fault injection.
    pub fn driver_mut(&mut self) -> &mut SimDriver {
        self.runtime.driver_mut()
    }

    /// The runtime.
    pub fn runtime(&self) -> &Runtime<SimDriver, SimEnv> {
        &self.runtime
    }

    /// Observable state for invariant checks.
    pub fn snapshot(&self) -> ClientSnapshot {
        self.driver().snapshot(self.app())
    }

    /// Contents of the conversation on screen, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.app()
            .conversation()
            .map(|conversation| {
                conversation.messages.iter().map(|message| message.content.clone()).collect()
            })
            .unwrap_or_default()
    }
}
