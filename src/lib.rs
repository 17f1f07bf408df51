//! WebSocket Pool - Reusable WebSocket sessions to a single endpoint.
//!
//! This library keeps a fixed number of WebSocket sessions open to one
//! remote endpoint and lends them out in batches, so short-lived requests
//! skip the connection handshake.
//!
//! # Architecture
//!
//! - A [`ConnectionPool`] owns every session it opens
//! - Callers borrow sessions through a scoped [`Lease`]; dropping the
//!   lease returns them, even on error or panic
//! - When every session is leased, acquires wait in arrival order
//! - Sessions are opened and closed through a [`Connector`], so the pool
//!   works over any transport
//!
//! # Quick Start
//!
//! ```no_run
//! use websocket_pool::{ConnectionPool, PoolConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pool = ConnectionPool::new(
//!         PoolConfig::new("ws://127.0.0.1:8546").with_capacity(8),
//!     )?;
//!     pool.start().await?;
//!
//!     {
//!         let mut lease = pool.acquire(2).await?;
//!         for conn in lease.iter_mut() {
//!             conn.send_text(r#"{"jsonrpc":"2.0","method":"eth_blockNumber","id":1}"#)
//!                 .await?;
//!             println!("{}", conn.recv_text().await?);
//!         }
//!     }
//!
//!     pool.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Pool configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Connection identity |
//! | [`transport`] | Pool, connector and WebSocket session |

// ============================================================================
// Modules
// ============================================================================

/// Pool configuration.
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for pooled connections.
pub mod identifiers;

/// WebSocket transport layer.
///
/// Holds the pool, the connector trait and the WebSocket session type.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::{DEFAULT_CAPACITY, PoolConfig};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ConnectionId;

// Transport types
pub use transport::{
    ConnectionPool, Connector, Lease, PoolStatus, PooledConnection, WsConnection, WsConnector,
};
