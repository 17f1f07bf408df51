//! Transport capability required by the pool.
//!
//! The pool never inspects a connection. All it needs is a way to open
//! one to the configured address and a way to close it again.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;

// ============================================================================
// Connector
// ============================================================================

/// Opens and closes connections for a [`ConnectionPool`](super::ConnectionPool).
///
/// Implemented by [`WsConnector`](super::WsConnector) for WebSocket
/// sessions. Custom implementations can pool any other session type.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type handed out by the pool.
    type Connection: Send + 'static;

    /// Opens a new connection to `address`.
    async fn open(&self, address: &str) -> Result<Self::Connection>;

    /// Closes a connection previously returned by [`Connector::open`].
    async fn close(&self, connection: Self::Connection) -> Result<()>;
}
