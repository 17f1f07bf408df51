//! WebSocket connection and the default connector.
//!
//! [`WsConnection`] wraps a client WebSocket stream and offers raw
//! text and JSON messaging. It does no request/response correlation;
//! that belongs to whatever protocol runs on top of the pool.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{from_str, to_string};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::error::{Error, Result};

use super::connector::Connector;

// ============================================================================
// Types
// ============================================================================

/// Client WebSocket stream type.
type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ============================================================================
// WsConnection
// ============================================================================

/// A live WebSocket session to the pool's target address.
pub struct WsConnection {
    /// Underlying stream.
    stream: ClientStream,
    /// Address the session was opened against.
    address: String,
}

impl fmt::Debug for WsConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsConnection")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl WsConnection {
    /// Opens a new session to `address`.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the handshake fails
    pub async fn connect(address: &str) -> Result<Self> {
        let (stream, response) = connect_async(address).await?;

        debug!(address, status = %response.status(), "WebSocket session opened");

        Ok(Self {
            stream,
            address: address.to_string(),
        })
    }

    /// Returns the address this session was opened against.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the write fails
    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text: String = text.into();
        trace!(len = text.len(), "Sending text message");
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Receives the next text message.
    ///
    /// Binary, ping, pong and raw frames are skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the remote end closed the session
    /// - [`Error::WebSocket`] if the read fails
    pub async fn recv_text(&mut self) -> Result<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(_))) | None => {
                    debug!(address = %self.address, "WebSocket closed by remote");
                    return Err(Error::ConnectionClosed);
                }
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Receives the next text message, waiting at most `recv_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if nothing arrives in time
    /// - otherwise as [`WsConnection::recv_text`]
    pub async fn recv_text_with_timeout(&mut self, recv_timeout: Duration) -> Result<String> {
        timeout(recv_timeout, self.recv_text())
            .await
            .map_err(|_| Error::timeout("receive", recv_timeout.as_millis() as u64))?
    }

    /// Serializes `value` and sends it as a text message.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if serialization fails
    /// - [`Error::WebSocket`] if the write fails
    pub async fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let json = to_string(value)?;
        self.send_text(json).await
    }

    /// Receives the next text message and deserializes it.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the message does not match `T`
    /// - otherwise as [`WsConnection::recv_text`]
    pub async fn recv_json<T: DeserializeOwned>(&mut self) -> Result<T> {
        let text = self.recv_text().await?;
        Ok(from_str(&text)?)
    }

    /// Sends a close frame and flushes the stream.
    ///
    /// Closing an already closed session succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::WebSocket`] if the close handshake fails
    pub async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(
                WsError::ConnectionClosed
                | WsError::AlreadyClosed
                | WsError::Protocol(ProtocolError::SendAfterClosing),
            ) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// WsConnector
// ============================================================================

/// Default [`Connector`] opening [`WsConnection`]s.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    /// Upper bound for a single handshake.
    connect_timeout: Option<Duration>,
}

impl WsConnector {
    /// Creates a connector without a connect timeout.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector bounding each handshake by `connect_timeout`.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn open(&self, address: &str) -> Result<WsConnection> {
        match self.connect_timeout {
            Some(limit) => timeout(limit, WsConnection::connect(address))
                .await
                .map_err(|_| Error::connection_timeout(limit.as_millis() as u64))?,
            None => WsConnection::connect(address).await,
        }
    }

    async fn close(&self, mut connection: WsConnection) -> Result<()> {
        connection.close().await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    /// Binds a local echo server and returns its `ws://` URL.
    pub(crate) async fn spawn_echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind should succeed");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(message)) = ws.next().await {
                        match message {
                            Message::Text(_) | Message::Binary(_) => {
                                if ws.send(message).await.is_err() {
                                    break;
                                }
                            }
                            Message::Close(_) => break,
                            _ => {}
                        }
                    }
                });
            }
        });

        format!("ws://127.0.0.1:{port}")
    }

    #[tokio::test]
    async fn test_text_echo() {
        let url = spawn_echo_server().await;
        let mut conn = WsConnection::connect(&url).await.expect("connect");
        assert_eq!(conn.address(), url);

        conn.send_text("ping").await.expect("send");
        assert_eq!(conn.recv_text().await.expect("recv"), "ping");

        conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_json_echo() {
        let url = spawn_echo_server().await;
        let mut conn = WsConnection::connect(&url).await.expect("connect");

        let request = json!({"jsonrpc": "2.0", "method": "eth_blockNumber", "id": 1});
        conn.send_json(&request).await.expect("send");
        let echoed: Value = conn.recv_json().await.expect("recv");
        assert_eq!(echoed, request);
    }

    #[tokio::test]
    async fn test_recv_timeout() {
        let url = spawn_echo_server().await;
        let mut conn = WsConnection::connect(&url).await.expect("connect");

        let err = conn
            .recv_text_with_timeout(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_close_twice() {
        let url = spawn_echo_server().await;
        let mut conn = WsConnection::connect(&url).await.expect("connect");
        conn.close().await.expect("first close");
        assert!(conn.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_connector_open_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        drop(listener);

        let connector = WsConnector::with_connect_timeout(Some(Duration::from_secs(5)));
        let result = connector.open(&format!("ws://127.0.0.1:{port}")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connector_round_trip() {
        let url = spawn_echo_server().await;
        let connector = WsConnector::new();
        let conn = connector.open(&url).await.expect("open");
        connector.close(conn).await.expect("close");
    }
}
