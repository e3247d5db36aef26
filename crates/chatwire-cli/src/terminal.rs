//! Terminal driver for the CLI.
//!
//! Implements the [`Driver`] trait for a plain terminal: user input is read
//! line by line from stdin, the transcript is appended to stdout, and the
//! network is a WebSocket from [`chatwire_client::transport`].

use std::{
    future,
    io::{self, Write},
    time::{Duration, Instant},
};

use chatwire_app::{App, ConnectionStatus, Driver, DriverEvent};
use chatwire_client::transport::{
    self, ConnectedClient, TransportConfig, TransportError, TransportEvent,
};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    time::{Interval, MissedTickBehavior},
};
use tracing::debug;

use crate::render;

/// Interval between timeout checks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error from stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Terminal driver implementing the [`Driver`] trait.
pub struct TerminalDriver {
    input: Lines<BufReader<Stdin>>,
    connection: Option<ConnectedClient>,
    ticker: Interval,
    transport: TransportConfig,
    printed: usize,
    last_status: Option<ConnectionStatus>,
}

impl TerminalDriver {
    /// Create a driver reading from this process's stdin.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(transport: TransportConfig) -> Self {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            input: BufReader::new(tokio::io::stdin()).lines(),
            connection: None,
            ticker,
            transport,
            printed: 0,
            last_status: None,
        }
    }
}

/// Next transport event, or never if there is no connection.
async fn recv_transport(connection: Option<&mut ConnectedClient>) -> Option<TransportEvent> {
    match connection {
        Some(connection) => connection.recv().await,
        None => future::pending().await,
    }
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn next_event(&mut self) -> Result<DriverEvent, Self::Error> {
        tokio::select! {
            biased;

            event = recv_transport(self.connection.as_mut()) => Ok(match event {
                Some(TransportEvent::Frame(text)) => DriverEvent::Frame(text),
                Some(TransportEvent::Closed { reason }) => DriverEvent::TransportClosed { reason },
                Some(TransportEvent::Failed { cause }) => DriverEvent::TransportFailed { cause },
                None => DriverEvent::TransportFailed { cause: "transport task ended".into() },
            }),

            line = self.input.next_line() => Ok(match line? {
                Some(line) => DriverEvent::Input(line),
                None => DriverEvent::InputClosed,
            }),

            _ = self.ticker.tick() => Ok(DriverEvent::Tick),
        }
    }

    async fn connect(&mut self, endpoint: &str) -> Result<(), Self::Error> {
        self.close();
        let client = transport::connect_with_config(endpoint, self.transport.clone()).await?;
        debug!(endpoint, "terminal connected");
        self.connection = Some(client);
        Ok(())
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), Self::Error> {
        let connection = self.connection.as_ref().ok_or(TransportError::NotOpen)?;
        connection.send(frame).await?;
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render(&mut self, app: &App) -> Result<(), Self::Error> {
        let mut out = io::stdout().lock();
        if self.last_status.as_ref() != Some(app.connection_status()) {
            let status = app.connection_status().clone();
            writeln!(out, "-- {} --", render::format_status(&status))?;
            self.last_status = Some(status);
        }
        self.printed = render::write_new_lines(&mut out, app.transcript(), self.printed)?;
        out.flush()?;
        Ok(())
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.close();
    }
}
