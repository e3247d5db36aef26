//! Chatwire reference server.
//!
//! Relays chatwire envelopes between WebSocket clients, using Tokio for the
//! async runtime and tokio-tungstenite for the WebSocket transport.
//!
//! # Architecture
//!
//! The [`Relay`] follows the Sans-IO pattern: it consumes [`RelayEvent`]s and
//! returns [`RelayAction`]s without touching the network. [`Server`] executes
//! those actions against real connections. The simulation harness drives the
//! same relay in-process.
//!
//! # Components
//!
//! - [`Relay`]: Action-based routing core (pure logic, no I/O)
//! - [`Server`]: Production runtime that executes relay actions
//! - [`WsTransport`]: TCP listener with WebSocket upgrade
//! - [`MemoryUserStore`]: In-memory account table

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod registry;
mod relay;
pub mod storage;
mod transport;

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

pub use error::ServerError;
use futures::{SinkExt, StreamExt};
pub use registry::{ConnectionRegistry, SessionInfo};
pub use relay::{
    LogLevel, MSG_INVALID_PASSWORD, MSG_INVALID_USERNAME, MSG_LOGIN_OK, MSG_MISSING_CREDENTIALS,
    MSG_REGISTERED, MSG_UNAVAILABLE, MSG_USERNAME_TAKEN, Relay, RelayAction, RelayConfig,
    RelayEvent,
};
pub use storage::{MemoryUserStore, StoreError, UserStore};
use tokio::{
    net::TcpStream,
    sync::{Mutex, RwLock, mpsc},
};
use tokio_tungstenite::tungstenite::{
    Message,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
pub use transport::{WsConnection, WsTransport};

/// Work queued for a connection's writer task.
enum Outbound {
    Frame(String),
    Close(String),
}

/// Shared state for all connections.
///
/// Each connection has one writer task; everything sent to a client goes
/// through its queue, which keeps per-connection ordering.
struct SharedState {
    /// Session ID → outbound queue
    outbound: RwLock<HashMap<u64, mpsc::UnboundedSender<Outbound>>>,
}

type SharedRelay = Arc<Mutex<Relay<MemoryUserStore>>>;

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:9000")
    pub bind_address: String,
    /// Relay behavior
    pub relay: RelayConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:9000".to_string(), relay: RelayConfig::default() }
    }
}

/// Production chatwire server.
///
/// Wraps [`Relay`] with the WebSocket transport.
pub struct Server {
    relay: Relay<MemoryUserStore>,
    transport: WsTransport,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let relay = Relay::new(MemoryUserStore::new(), config.relay);
        let transport = WsTransport::bind(&config.bind_address).await?;

        Ok(Self { relay, transport })
    }

    /// Run the server, accepting connections and relaying frames.
    ///
    /// This method runs until the task is cancelled.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let relay = Arc::new(Mutex::new(self.relay));
        let shared = Arc::new(SharedState { outbound: RwLock::new(HashMap::new()) });
        let next_session = Arc::new(AtomicU64::new(1));

        loop {
            match self.transport.accept().await {
                Ok((stream, peer)) => {
                    let session_id = next_session.fetch_add(1, Ordering::Relaxed);
                    let relay = Arc::clone(&relay);
                    let shared = Arc::clone(&shared);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(session_id, stream, relay, shared).await
                        {
                            tracing::debug!(%peer, "Connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Handle a single connection from upgrade to close.
async fn handle_connection(
    session_id: u64,
    stream: TcpStream,
    relay: SharedRelay,
    shared: Arc<SharedState>,
) -> Result<(), ServerError> {
    let socket = transport::upgrade(stream).await?;
    let (mut sink, mut stream) = socket.split();

    tracing::debug!("New connection: {}", session_id);

    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    shared.outbound.write().await.insert(session_id, tx);

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.into())).await {
                        tracing::debug!("Write failed for {}: {}", session_id, e);
                        break;
                    }
                },
                Outbound::Close(reason) => {
                    let frame = CloseFrame { code: CloseCode::Normal, reason: reason.into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    break;
                },
            }
        }
        let _ = sink.close().await;
    });

    dispatch(&relay, &shared, RelayEvent::ConnectionAccepted { session_id }).await;

    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let frame = text.as_str().to_owned();
                dispatch(&relay, &shared, RelayEvent::FrameReceived { session_id, frame }).await;
            },
            Some(Ok(Message::Close(_))) => break "closed by client".to_string(),
            Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                Ok(frame) => {
                    dispatch(&relay, &shared, RelayEvent::FrameReceived { session_id, frame })
                        .await;
                },
                Err(_) => tracing::debug!("Dropping non-UTF-8 binary frame from {}", session_id),
            },
            Some(Ok(_)) => {},
            Some(Err(e)) => break e.to_string(),
            None => break "connection reset".to_string(),
        }
    };

    // Dropping the queue ends the writer once it drains.
    shared.outbound.write().await.remove(&session_id);
    dispatch(&relay, &shared, RelayEvent::ConnectionClosed { session_id, reason }).await;

    writer.await?;
    Ok(())
}

/// Process one relay event and execute the resulting actions.
///
/// The relay lock is held across execution so fan-out order matches
/// processing order.
async fn dispatch(relay: &SharedRelay, shared: &SharedState, event: RelayEvent) {
    let mut relay = relay.lock().await;
    let actions = relay.process_event(event);
    execute_actions(actions, shared).await;
}

/// Execute relay actions.
async fn execute_actions(actions: Vec<RelayAction>, shared: &SharedState) {
    for action in actions {
        match action {
            RelayAction::SendToSession { session_id, frame } => {
                let outbound = shared.outbound.read().await;
                match outbound.get(&session_id) {
                    Some(queue) => {
                        if queue.send(Outbound::Frame(frame)).is_err() {
                            tracing::debug!("SendToSession: session {} is closing", session_id);
                        }
                    },
                    None => tracing::warn!("SendToSession: session {} not found", session_id),
                }
            },

            RelayAction::CloseConnection { session_id, reason } => {
                tracing::info!("Closing connection {}: {}", session_id, reason);
                if let Some(queue) = shared.outbound.write().await.remove(&session_id) {
                    let _ = queue.send(Outbound::Close(reason));
                }
            },

            RelayAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}
