//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: UI state machine
//! - [`Bridge`]: Protocol bridge to Client
//! - [`Driver`]: Platform-specific I/O
//!
//! Every mutation flows through one `&mut Runtime`: the driver hands over one
//! event at a time and nothing else touches the session in between.
//!
//! Each successful [`Driver::connect`] is matched by exactly one
//! [`Driver::close`], whether the session ends by `/leave`, by a reconnect,
//! by the server, by a handshake timeout, or by the loop exiting.

use chatwire_client::{Environment, SessionConfig};

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverEvent, bridge::Outgoing};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment supplying time to the session
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    app: App,
    bridge: Bridge<E>,
    /// The driver holds an open connection that still needs closing.
    connected: bool,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Create a new runtime with the given driver and environment.
    pub fn new(driver: D, env: E, config: SessionConfig, endpoint: impl Into<String>) -> Self {
        let app = App::new(endpoint);
        let bridge = Bridge::new(env, config);
        Self { driver, app, bridge, connected: false }
    }

    /// Run the main event loop.
    ///
    /// Connects once at startup, then processes driver events until the user
    /// quits, input ends, or the driver fails. The connection is closed on
    /// every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver cannot read input or render.
    pub async fn run(&mut self) -> Result<(), D::Error> {
        let result = self.run_loop().await;
        self.release_transport();
        result
    }

    async fn run_loop(&mut self) -> Result<(), D::Error> {
        self.driver.render(&self.app)?;

        let actions = self.app.connect();
        if self.process_actions(actions).await? {
            return Ok(());
        }

        loop {
            let event = self.driver.next_event().await?;
            if self.process_driver_event(event).await? {
                return Ok(());
            }
        }
    }

    /// Process one driver event.
    ///
    /// Returns `true` if the application should quit.
    pub async fn process_driver_event(&mut self, event: DriverEvent) -> Result<bool, D::Error> {
        let events = match event {
            DriverEvent::Input(line) => {
                let actions = self.app.handle(AppEvent::Input(line));
                return self.process_actions(actions).await;
            },
            DriverEvent::InputClosed => return Ok(true),
            DriverEvent::Frame(frame) => self.bridge.handle_frame(frame),
            DriverEvent::TransportClosed { reason } => {
                self.release_transport();
                self.bridge.transport_closed(reason)
            },
            DriverEvent::TransportFailed { cause } => {
                self.release_transport();
                self.bridge.transport_failed(cause)
            },
            DriverEvent::Tick => {
                let now = self.driver.now();
                self.bridge.handle_tick(now)
            },
        };

        self.process_bridge_events(events).await
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, initial_actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut pending_actions = initial_actions;

        while !pending_actions.is_empty() {
            let actions = std::mem::take(&mut pending_actions);

            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app)?,
                    AppAction::Quit => return Ok(true),
                    AppAction::Connect => {
                        for event in self.connect().await {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },

                    // Protocol operations go through the bridge
                    AppAction::Disconnect
                    | AppAction::SubmitCredentials(_)
                    | AppAction::OpenConversation(_)
                    | AppAction::SendMessage { .. } => {
                        let mut events = self.bridge.process_app_action(action);
                        events.extend(self.flush().await);
                        for event in events {
                            pending_actions.extend(self.app.handle(event));
                        }
                    },
                }
            }
        }
        Ok(false)
    }

    /// Process events from Bridge back to App.
    async fn process_bridge_events(&mut self, mut events: Vec<AppEvent>) -> Result<bool, D::Error> {
        events.extend(self.flush().await);

        let mut actions = Vec::new();
        for event in events {
            actions.extend(self.app.handle(event));
        }
        self.process_actions(actions).await
    }

    /// End the current session, if any, and open a fresh one.
    async fn connect(&mut self) -> Vec<AppEvent> {
        let mut events = self.bridge.close();
        events.extend(self.flush().await);
        self.release_transport();

        self.bridge.start_session();
        events.push(AppEvent::Connecting);

        let endpoint = self.app.endpoint().to_string();
        match self.driver.connect(&endpoint).await {
            Ok(()) => {
                tracing::info!(%endpoint, "connected");
                self.connected = true;
                events.extend(self.bridge.transport_opened());
            },
            Err(e) => {
                tracing::warn!(%endpoint, error = %e, "connect failed");
                events.extend(self.bridge.connect_failed(e.to_string()));
            },
        }

        events.extend(self.flush().await);
        events
    }

    /// Send all pending outgoing frames and honor a close request.
    ///
    /// Send failures are not fatal: the affected message is marked
    /// undelivered.
    async fn flush(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for Outgoing { frame, entry } in self.bridge.take_outgoing() {
            let result = if self.connected {
                self.driver.send_frame(frame).await.map_err(|e| e.to_string())
            } else {
                Err("transport not open".to_string())
            };

            match (result, entry) {
                (Ok(()), Some(entry)) => events.extend(self.bridge.send_completed(entry)),
                (Ok(()), None) => {},
                (Err(reason), Some(entry)) => {
                    events.extend(self.bridge.send_failed(entry, reason));
                },
                (Err(reason), None) => tracing::warn!(%reason, "control frame not sent"),
            }
        }

        if self.bridge.take_close_request() {
            self.release_transport();
        }

        events
    }

    /// Close the driver's connection if one is open.
    ///
    /// [`Runtime::run`] does this on exit. Callers stepping the runtime with
    /// [`Runtime::process_driver_event`] call it when they are done.
    pub fn shutdown(&mut self) {
        self.release_transport();
    }

    fn release_transport(&mut self) {
        if self.connected {
            self.connected = false;
            self.driver.close();
        }
    }

    /// Whether the driver holds an open connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App {
        &self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
