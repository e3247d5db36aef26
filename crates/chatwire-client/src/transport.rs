//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which handles WebSocket I/O for text frames.
//! This is a thin layer that just sends/receives frames - protocol logic
//! remains in the Sans-IO [`crate::Client`]. Binary frames holding UTF-8 are
//! delivered as text; other binary frames are dropped.
//!
//! A background task owns the socket. Inbound frames arrive as
//! [`TransportEvent::Frame`], followed by exactly one terminal event:
//! [`TransportEvent::Closed`] for an orderly close from either side, or
//! [`TransportEvent::Failed`] when the connection breaks. Nothing is
//! delivered after the terminal event.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use tracing::{debug, trace, warn};

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Transport was closed, locally or by its terminal event.
    #[error("transport not open")]
    NotOpen,

    /// The socket write failed. The connection ends with `Failed`.
    #[error("write failed: {0}")]
    Write(String),
}

/// Events delivered by the transport task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Text frame from the server.
    Frame(String),

    /// Orderly close.
    Closed {
        /// Close reason.
        reason: String,
    },

    /// Connection broke.
    Failed {
        /// Failure cause.
        cause: String,
    },
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum time to establish the connection.
    pub connect_timeout: Duration,
    /// Capacity of the inbound and outbound frame channels.
    pub channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10), channel_capacity: 64 }
    }
}

/// Outbound frame and the channel its write result goes back on.
struct Outbound {
    frame: String,
    written: oneshot::Sender<Result<(), TransportError>>,
}

/// Handle to a connected WebSocket.
///
/// Frames are sent/received via channels, and an internal task handles the
/// socket I/O. Dropping the handle closes the connection.
pub struct ConnectedClient {
    /// Outbound frames. `None` once closed locally.
    to_server: Option<mpsc::Sender<Outbound>>,
    /// Inbound frames and the terminal event.
    from_server: mpsc::Receiver<TransportEvent>,
}

impl ConnectedClient {
    /// Send a text frame and wait until it is written to the socket.
    ///
    /// # Errors
    ///
    /// - `TransportError::NotOpen` after [`Self::close`], or if the
    ///   connection ended before the frame was written
    /// - `TransportError::Write` if the socket write failed
    pub async fn send(&self, frame: String) -> Result<(), TransportError> {
        let to_server = self.to_server.as_ref().ok_or(TransportError::NotOpen)?;
        let (written, result) = oneshot::channel();
        to_server.send(Outbound { frame, written }).await.map_err(|_| TransportError::NotOpen)?;
        // Frames still queued when the task exits are dropped with their sender.
        result.await.unwrap_or(Err(TransportError::NotOpen))
    }

    /// Next inbound event. `None` once the terminal event has been taken.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.from_server.recv().await
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.to_server.take().is_some() {
            debug!("closing transport");
        }
    }

    /// True until [`Self::close`] is called.
    pub fn is_open(&self) -> bool {
        self.to_server.is_some()
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connect to a chatwire server at a `ws://` or `wss://` endpoint.
///
/// Returns a [`ConnectedClient`] with channels for frame transport.
pub async fn connect(endpoint: &str) -> Result<ConnectedClient, TransportError> {
    connect_with_config(endpoint, TransportConfig::default()).await
}

/// Connect with explicit configuration.
pub async fn connect_with_config(
    endpoint: &str,
    config: TransportConfig,
) -> Result<ConnectedClient, TransportError> {
    let (socket, _response) =
        tokio::time::timeout(config.connect_timeout, tokio_tungstenite::connect_async(endpoint))
            .await
            .map_err(|_| {
                TransportError::Connection(format!(
                    "timed out after {:?} connecting to {endpoint}",
                    config.connect_timeout
                ))
            })?
            .map_err(|e| TransportError::Connection(format!("connect to {endpoint} failed: {e}")))?;

    debug!(%endpoint, "transport connected");

    let (to_server_tx, to_server_rx) = mpsc::channel::<Outbound>(config.channel_capacity);
    let (from_server_tx, from_server_rx) = mpsc::channel::<TransportEvent>(config.channel_capacity);

    tokio::spawn(run_connection(socket, to_server_rx, from_server_tx));

    Ok(ConnectedClient { to_server: Some(to_server_tx), from_server: from_server_rx })
}

/// Run the connection, bridging between channels and the socket.
async fn run_connection(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut to_server: mpsc::Receiver<Outbound>,
    from_server: mpsc::Sender<TransportEvent>,
) {
    let (mut sink, mut stream) = socket.split();

    let terminal = loop {
        tokio::select! {
            outbound = to_server.recv() => match outbound {
                Some(Outbound { frame, written }) => {
                    match sink.send(Message::Text(frame.into())).await {
                        Ok(()) => {
                            let _ = written.send(Ok(()));
                        },
                        Err(e) => {
                            warn!(error = %e, "send failed");
                            let _ = written.send(Err(TransportError::Write(e.to_string())));
                            break TransportEvent::Failed { cause: e.to_string() };
                        },
                    }
                },
                None => {
                    let _ = sink.close().await;
                    break TransportEvent::Closed { reason: "closed by client".to_string() };
                },
            },
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    let event = TransportEvent::Frame(text.as_str().to_owned());
                    if from_server.send(event).await.is_err() {
                        let _ = sink.close().await;
                        break TransportEvent::Closed { reason: "receiver dropped".to_string() };
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    break TransportEvent::Closed { reason };
                },
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => {
                        debug!(len = text.len(), "binary frame carries text, forwarding");
                        if from_server.send(TransportEvent::Frame(text)).await.is_err() {
                            let _ = sink.close().await;
                            break TransportEvent::Closed { reason: "receiver dropped".to_string() };
                        }
                    },
                    Err(_) => debug!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                },
                Some(Ok(other)) => trace!(?other, "ignoring control frame"),
                Some(Err(e)) => {
                    warn!(error = %e, "receive failed");
                    break TransportEvent::Failed { cause: e.to_string() };
                },
                None => {
                    break TransportEvent::Failed { cause: "connection reset".to_string() };
                },
            },
        }
    };

    debug!(?terminal, "transport ended");
    let _ = from_server.send(terminal).await;
}
