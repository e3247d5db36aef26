//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use crate::App;

/// Inputs a driver delivers to the runtime, one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// A line of user input.
    Input(String),
    /// User input ended; the runtime quits.
    InputClosed,
    /// Text frame from the server.
    Frame(String),
    /// The server closed the connection.
    TransportClosed {
        /// Close reason.
        reason: String,
    },
    /// The connection broke.
    TransportFailed {
        /// Failure cause.
        cause: String,
    },
    /// Periodic tick for timeouts.
    Tick,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal client and simulation.
///
/// # Implementations
///
/// - **Terminal**: stdin lines, WebSocket transport, tokio interval ticks
/// - **Simulation**: in-process relay with a virtual clock and fault injection
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Returns an error if input can no longer be read. The runtime stops.
    fn next_event(&mut self) -> impl Future<Output = Result<DriverEvent, Self::Error>> + Send;

    /// Establish a connection to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established. The runtime
    /// reports it and keeps running.
    fn connect(&mut self, endpoint: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a frame to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the send fails. The
    /// frame's message is marked undelivered.
    fn send_frame(&mut self, frame: String)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the connection and release its resources.
    fn close(&mut self);

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails. The runtime stops.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;
}
