//! Pool configuration.
//!
//! Provides a type-safe interface for configuring the target endpoint,
//! capacity and timeouts of a [`ConnectionPool`](crate::ConnectionPool).
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use websocket_pool::PoolConfig;
//!
//! let config = PoolConfig::new("ws://127.0.0.1:8546")
//!     .with_capacity(8)
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_acquire_timeout(Duration::from_secs(2));
//!
//! config.validate()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default number of connections kept by a pool.
pub const DEFAULT_CAPACITY: usize = 20;

// ============================================================================
// PoolConfig
// ============================================================================

/// Configuration for a connection pool.
///
/// `capacity` is fixed for the lifetime of the pool built from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Target address, e.g. `ws://127.0.0.1:8546`.
    pub address: String,

    /// Number of connections opened on start.
    pub capacity: usize,

    /// Upper bound for opening a single connection.
    pub connect_timeout: Option<Duration>,

    /// Default upper bound for a blocked acquire. `None` waits forever.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            capacity: DEFAULT_CAPACITY,
            connect_timeout: None,
            acquire_timeout: None,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl PoolConfig {
    /// Creates a configuration for `address` with default capacity.
    #[inline]
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl PoolConfig {
    /// Sets the pool capacity.
    #[inline]
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the per-connection connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the default acquire timeout.
    #[inline]
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl PoolConfig {
    /// Validates capacity and timeouts.
    ///
    /// The address is not interpreted here; transports validate it
    /// themselves (see [`PoolConfig::validate_ws_address`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::config("capacity must be greater than zero"));
        }

        if self.address.trim().is_empty() {
            return Err(Error::config("address must not be empty"));
        }

        if self.connect_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("connect timeout must be greater than zero"));
        }

        if self.acquire_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("acquire timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Checks that the address is a plain `ws://` URL with a host.
    ///
    /// `wss://` is rejected: the WebSocket stack is built without TLS.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the address is not a WebSocket URL.
    pub fn validate_ws_address(&self) -> Result<Url> {
        let url = Url::parse(&self.address)
            .map_err(|e| Error::config(format!("invalid address {:?}: {e}", self.address)))?;

        match url.scheme() {
            "ws" => {}
            "wss" => {
                return Err(Error::config(format!(
                    "address {:?} needs TLS, which is not enabled",
                    self.address
                )));
            }
            other => {
                return Err(Error::config(format!(
                    "unsupported scheme {other:?}, expected ws"
                )));
            }
        }

        if url.host_str().is_none() {
            return Err(Error::config(format!(
                "address {:?} has no host",
                self.address
            )));
        }

        Ok(url)
    }
}

// ============================================================================
// Tests
// ============================================================================
