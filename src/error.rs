//! Error types for the WebSocket pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use websocket_pool::{ConnectionPool, PoolConfig, Result};
//!
//! async fn example() -> Result<()> {
//!     let pool = ConnectionPool::new(PoolConfig::new("ws://127.0.0.1:8546"))?;
//!     pool.start().await?;
//!     pool.quit().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Lifecycle | [`Error::ConnectionSetup`], [`Error::ConnectionClose`], [`Error::Shutdown`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Execution | [`Error::Timeout`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::ConnectionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when pool configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to a pool operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Opening the initial set of connections failed.
    ///
    /// Returned from `start`. Connections opened before the failure
    /// have already been closed.
    #[error("Connection setup to {address} failed: {message}")]
    ConnectionSetup {
        /// Target address of the pool.
        address: String,
        /// Description of the first failure.
        message: String,
    },

    /// Closing a single idle connection failed.
    #[error("Failed to close connection {connection_id}: {message}")]
    ConnectionClose {
        /// The connection that failed to close.
        connection_id: ConnectionId,
        /// Description of the close failure.
        message: String,
    },

    /// One or more connections failed to close during shutdown.
    ///
    /// Every idle connection was still attempted; `failures` holds
    /// one [`Error::ConnectionClose`] per failed close.
    #[error("{} connection(s) failed to close during shutdown", .failures.len())]
    Shutdown {
        /// Individual close failures.
        failures: Vec<Error>,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt timed out.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// WebSocket connection closed by the remote end.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// Operation timeout.
    ///
    /// Returned when an acquire does not get a connection in time.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a connection setup error.
    #[inline]
    pub fn connection_setup(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionSetup {
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a connection close error.
    #[inline]
    pub fn connection_close(connection_id: ConnectionId, message: impl Into<String>) -> Self {
        Self::ConnectionClose {
            connection_id,
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionSetup { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionSetup { .. } | Self::ConnectionTimeout { .. } | Self::Timeout { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "Connection failed: failed to connect");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("capacity must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: capacity must be greater than zero"
        );
    }

    #[test]
    fn test_setup_error_display() {
        let err = Error::connection_setup("ws://127.0.0.1:1", "refused");
        assert_eq!(
            err.to_string(),
            "Connection setup to ws://127.0.0.1:1 failed: refused"
        );
    }

    #[test]
    fn test_shutdown_counts_failures() {
        let err = Error::Shutdown {
            failures: vec![
                Error::connection_close(ConnectionId::from_u64(1), "reset"),
                Error::connection_close(ConnectionId::from_u64(2), "reset"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "2 connection(s) failed to close during shutdown"
        );
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::timeout("acquire", 5000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::connection_setup("ws://x", "y").is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::timeout("acquire", 1000).is_recoverable());
        assert!(!Error::config("test").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::ConnectionRefused, "refused");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
