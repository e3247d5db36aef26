//! WebSocket transport.
//!
//! Plain TCP listener with a WebSocket upgrade per accepted socket. The
//! upgrade runs inside the per-connection task so a slow handshake never
//! stalls the accept loop.

use std::net::{AddrParseError, SocketAddr};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;

use crate::error::ServerError;

/// Accepted WebSocket connection.
pub type WsConnection = WebSocketStream<TcpStream>;

/// WebSocket transport bound to a TCP address.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind to `address`, e.g. `"0.0.0.0:9000"` or `"127.0.0.1:0"`.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e: AddrParseError| ServerError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { address: addr, source })?;

        tracing::info!("WebSocket transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept the next TCP connection. Blocks until one is available.
    ///
    /// The WebSocket upgrade is left to [`upgrade`].
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        Ok(self.listener.accept().await?)
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Complete the WebSocket handshake on an accepted socket.
pub async fn upgrade(stream: TcpStream) -> Result<WsConnection, ServerError> {
    Ok(tokio_tungstenite::accept_async(stream).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_rejects_invalid_address() {
        let result = WsTransport::bind("not-an-address").await;
        assert!(matches!(result, Err(ServerError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn bind_ephemeral_port() {
        let transport = WsTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }
}
