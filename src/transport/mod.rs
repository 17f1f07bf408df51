//! WebSocket transport layer.
//!
//! This module holds the pool and the transport it pools.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Callers        │                              │  Remote         │
//! │                 │     N WebSocket sessions     │  endpoint       │
//! │  Lease ─────────┤◄────────────────────────────►│                 │
//! │  ConnectionPool │      ws://host:port          │                 │
//! │                 │                              │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `ConnectionPool::start` - Open `capacity` sessions via the [`Connector`]
//! 2. `ConnectionPool::acquire` - Borrow a batch as a [`Lease`]
//! 3. Drop the `Lease` - Sessions return to the idle set
//! 4. `ConnectionPool::quit` - Close idle sessions
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connector` | Open/close capability the pool depends on |
//! | `connection` | WebSocket session and default connector |
//! | `pool` | Bounded pool, leases and accounting |

// ============================================================================
// Submodules
// ============================================================================

/// Open/close capability required by the pool.
pub mod connector;

/// WebSocket session and default connector.
pub mod connection;

/// Bounded connection pool.
pub mod pool;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{WsConnection, WsConnector};
pub use connector::Connector;
pub use pool::{ConnectionPool, Lease, PoolStatus, PooledConnection};
