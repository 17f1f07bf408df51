//! Bounded pool of reusable connections to a single endpoint.
//!
//! Opening a WebSocket session costs a TCP and HTTP upgrade handshake.
//! The pool opens a fixed number of sessions up front and lends them
//! out in batches, so short-lived requests skip the handshake.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ConnectionPool                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ PoolState (one lock)                   │  │
//! │  │   idle:    [conn-4, conn-5, conn-6]    │  │
//! │  │   leased:  2                           │  │
//! │  │   waiters: [batch=3] → oneshot         │  │
//! │  └────────────────────────────────────────┘  │
//! │        ▲ release (Drop)     │ acquire        │
//! │        │                    ▼                │
//! │     Lease [conn-1, conn-2]                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Accounting
//!
//! While running, `leased + idle.len() == capacity`. Taking connections
//! from the idle set and bumping `leased` happen under the same lock, and
//! so does the reverse on release. An acquire that finds the idle set
//! empty parks in a FIFO waiter queue; releases hand connections to the
//! oldest waiter first.
//!
//! Each stop bumps a generation counter. Connections released from an
//! older generation are closed through the connector instead of
//! re-entering the idle set.
//!
//! Start and stop run on spawned tasks holding the lifecycle lock, so a
//! caller cancelled mid-transition never strands open connections.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::identifiers::ConnectionId;

use super::connection::WsConnector;
use super::connector::Connector;

// ============================================================================
// PooledConnection
// ============================================================================

/// A connection owned by the pool, tagged with its identity.
///
/// Dereferences to the underlying transport connection.
pub struct PooledConnection<T> {
    /// Process-unique identity.
    id: ConnectionId,
    /// Transport connection.
    connection: T,
}

impl<T> PooledConnection<T> {
    fn new(connection: T) -> Self {
        Self {
            id: ConnectionId::next(),
            connection,
        }
    }

    /// Returns the connection's identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    fn into_inner(self) -> T {
        self.connection
    }
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.connection
    }
}

impl<T> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.connection
    }
}

impl<T> fmt::Debug for PooledConnection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PoolStatus
// ============================================================================

/// Point-in-time snapshot of pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Fixed number of connections the pool manages.
    pub capacity: usize,
    /// Connections sitting in the idle set.
    pub idle: usize,
    /// Connections currently out on a lease.
    pub leased: usize,
    /// Acquires parked waiting for a connection.
    pub waiting: usize,
    /// Whether the pool is running.
    pub running: bool,
}

impl PoolStatus {
    /// Fraction of capacity currently leased, from 0.0 to 1.0.
    #[inline]
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.leased as f64 / self.capacity as f64
        }
    }
}

// ============================================================================
// Internal State
// ============================================================================

/// Connections handed to a parked acquire.
struct Grant<T> {
    connections: Vec<PooledConnection<T>>,
    generation: u64,
}

/// A parked acquire.
struct Waiter<T> {
    batch: usize,
    tx: oneshot::Sender<Grant<T>>,
}

/// Idle set, lease counter and waiter queue, guarded together.
struct PoolState<T> {
    idle: VecDeque<PooledConnection<T>>,
    leased: usize,
    running: bool,
    generation: u64,
    waiters: VecDeque<Waiter<T>>,
}

impl<T> PoolState<T> {
    fn new(capacity: usize) -> Self {
        Self {
            idle: VecDeque::with_capacity(capacity),
            leased: 0,
            running: false,
            generation: 0,
            waiters: VecDeque::new(),
        }
    }

    /// Moves up to `batch` idle connections onto a lease.
    fn take(&mut self, batch: usize) -> Vec<PooledConnection<T>> {
        let count = batch.min(self.idle.len());
        self.leased += count;
        self.idle.drain(..count).collect()
    }

    /// Serves parked acquires in arrival order while idle connections remain.
    fn dispatch(&mut self) {
        while !self.idle.is_empty() {
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };

            // Timed out or cancelled.
            if waiter.tx.is_closed() {
                continue;
            }

            let connections = self.take(waiter.batch);
            let count = connections.len();
            let grant = Grant {
                connections,
                generation: self.generation,
            };

            if let Err(grant) = waiter.tx.send(grant) {
                self.leased -= count;
                for connection in grant.connections.into_iter().rev() {
                    self.idle.push_front(connection);
                }
            } else {
                trace!(count, "Handed connections to waiter");
            }
        }
    }

    fn waiting(&self) -> usize {
        self.waiters.iter().filter(|w| !w.tx.is_closed()).count()
    }
}

// ============================================================================
// ConnectionPool
// ============================================================================

/// Fixed-capacity pool of connections to one target address.
///
/// Created stopped and empty. [`start`](Self::start) opens `capacity`
/// connections, [`acquire`](Self::acquire) lends them out and
/// [`quit`](Self::quit) closes whatever is idle.
///
/// The pool is `Send + Sync`; share it across tasks with an `Arc`.
///
/// # Example
///
/// ```ignore
/// use websocket_pool::{ConnectionPool, PoolConfig};
///
/// let pool = ConnectionPool::new(PoolConfig::new("ws://127.0.0.1:8546").with_capacity(4))?;
/// pool.start().await?;
///
/// {
///     let mut lease = pool.acquire(2).await?;
///     for conn in lease.iter_mut() {
///         conn.send_text(r#"{"jsonrpc":"2.0","method":"eth_blockNumber","id":1}"#).await?;
///         let reply = conn.recv_text().await?;
///     }
/// } // connections go back to the pool here
///
/// pool.quit().await?;
/// ```
pub struct ConnectionPool<C: Connector = WsConnector> {
    /// Default timeout for [`ConnectionPool::acquire`].
    acquire_timeout: Option<Duration>,

    /// State shared with lifecycle and cleanup tasks.
    shared: Arc<Shared<C>>,
}

/// Pool internals reachable from spawned tasks.
struct Shared<C: Connector> {
    /// Target address handed to the connector.
    address: String,

    /// Fixed number of connections.
    capacity: usize,

    /// Opens and closes connections.
    connector: C,

    /// Accounting state.
    state: Mutex<PoolState<C::Connection>>,

    /// Serializes start and stop transitions.
    lifecycle: Arc<AsyncMutex<()>>,
}

// ============================================================================
// ConnectionPool - Constructor
// ============================================================================

impl ConnectionPool<WsConnector> {
    /// Creates a stopped WebSocket pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the
    /// address is not a `ws://` URL.
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate_ws_address()?;
        let connector = WsConnector::with_connect_timeout(config.connect_timeout);
        Self::with_connector(config, connector)
    }
}

impl<C: Connector> ConnectionPool<C> {
    /// Creates a stopped pool using a custom connector.
    ///
    /// `config.connect_timeout` is left to the connector to honor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn with_connector(config: PoolConfig, connector: C) -> Result<Self> {
        config.validate()?;

        debug!(
            address = %config.address,
            capacity = config.capacity,
            "ConnectionPool created"
        );

        Ok(Self {
            acquire_timeout: config.acquire_timeout,
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState::new(config.capacity)),
                address: config.address,
                capacity: config.capacity,
                connector,
                lifecycle: Arc::new(AsyncMutex::new(())),
            }),
        })
    }
}

// ============================================================================
// ConnectionPool - Accessors
// ============================================================================

impl<C: Connector> ConnectionPool<C> {
    /// Returns the target address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &str {
        &self.shared.address
    }

    /// Returns the fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Returns the connector.
    #[inline]
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    /// Returns `true` if the pool is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Returns a snapshot of the pool accounting.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        PoolStatus {
            capacity: self.shared.capacity,
            idle: state.idle.len(),
            leased: state.leased,
            waiting: state.waiting(),
            running: state.running,
        }
    }
}

// ============================================================================
// ConnectionPool - Lifecycle
// ============================================================================

impl<C: Connector> ConnectionPool<C> {
    /// Opens `capacity` fresh connections and marks the pool running.
    ///
    /// On a running pool this is a full restart: idle connections are
    /// closed first and connections out on a lease are invalidated.
    /// They are closed when their lease ends.
    ///
    /// The transition runs on its own task. Dropping this future, for
    /// example under a timeout, does not abort it; the pool still ends up
    /// either running or stopped with nothing left open.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionSetup`] if any connection fails to open.
    /// Connections that did open are closed first and the pool is left
    /// stopped.
    pub async fn start(&self) -> Result<()> {
        let guard = Arc::clone(&self.shared.lifecycle).lock_owned().await;
        self.run_start(guard).await
    }

    /// Closes every idle connection and marks the pool stopped.
    ///
    /// Connections out on a lease are not closed here; the connector
    /// closes them when their lease ends. Acquires parked on the pool are
    /// woken and start it again. Calling this on a stopped pool does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Shutdown`] listing every close that failed. The
    /// pool is stopped regardless.
    pub async fn quit(&self) -> Result<()> {
        let guard = Arc::clone(&self.shared.lifecycle).lock_owned().await;
        let shared = Arc::clone(&self.shared);

        let failures = tokio::spawn(async move {
            let _guard = guard;
            shared.stop_locked(true).await
        })
        .await
        .map_err(|e| Error::connection(format!("shutdown task failed: {e}")))?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown { failures })
        }
    }

    /// Starts the pool if it is stopped.
    async fn ensure_running(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let guard = Arc::clone(&self.shared.lifecycle).lock_owned().await;
        if self.is_running() {
            return Ok(());
        }

        debug!(address = %self.shared.address, "Pool stopped, starting on demand");
        self.run_start(guard).await
    }

    /// Spawns the start transition. The task owns the lifecycle guard
    /// until it finishes.
    async fn run_start(&self, guard: OwnedMutexGuard<()>) -> Result<()> {
        let shared = Arc::clone(&self.shared);

        tokio::spawn(async move {
            let _guard = guard;
            shared.start_locked().await
        })
        .await
        .map_err(|e| Error::connection(format!("start task failed: {e}")))?
    }
}

impl<C: Connector> Shared<C> {
    fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Caller must hold the lifecycle lock.
    async fn start_locked(&self) -> Result<()> {
        if self.is_running() {
            info!(address = %self.address, "Restarting running pool");
            // Close failures during a restart are logged only.
            let _ = self.stop_locked(false).await;
        }

        let results = join_all((0..self.capacity).map(|_| self.connector.open(&self.address))).await;

        let mut opened = Vec::with_capacity(self.capacity);
        let mut first_error = None;
        for result in results {
            match result {
                Ok(connection) => opened.push(PooledConnection::new(connection)),
                Err(e) => {
                    warn!(address = %self.address, error = %e, "Failed to open connection");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            let count = opened.len();
            let failures = self.close_all(opened).await;
            debug!(
                closed = count - failures.len(),
                failed = failures.len(),
                "Discarded partially opened connections"
            );

            // Parked acquires retry and surface the failure themselves.
            let waiters: Vec<_> = self.state.lock().waiters.drain(..).collect();
            drop(waiters);

            return Err(Error::connection_setup(&self.address, err.to_string()));
        }

        let mut state = self.state.lock();
        state.idle.extend(opened);
        state.leased = 0;
        state.running = true;
        state.dispatch();

        info!(
            address = %self.address,
            capacity = self.capacity,
            generation = state.generation,
            "ConnectionPool started"
        );

        Ok(())
    }

    /// Caller must hold the lifecycle lock. Returns the close failures.
    async fn stop_locked(&self, wake_waiters: bool) -> Vec<Error> {
        let (idle, waiters) = {
            let mut state = self.state.lock();
            let was_running = mem::replace(&mut state.running, false);
            if was_running {
                state.generation += 1;
            }
            state.leased = 0;

            let idle: Vec<_> = state.idle.drain(..).collect();
            let waiters: Vec<_> = if wake_waiters {
                state.waiters.drain(..).collect()
            } else {
                Vec::new()
            };
            (idle, waiters)
        };

        // Dropping the senders makes parked acquires retry.
        if !waiters.is_empty() {
            debug!(count = waiters.len(), "Waking parked acquires");
        }
        drop(waiters);

        let count = idle.len();
        let failures = self.close_all(idle).await;

        if count > 0 {
            info!(
                address = %self.address,
                closed = count - failures.len(),
                failed = failures.len(),
                "ConnectionPool stopped"
            );
        }

        failures
    }

    /// Closes each connection in turn and collects the failures.
    async fn close_all(&self, connections: Vec<PooledConnection<C::Connection>>) -> Vec<Error> {
        let mut failures = Vec::new();
        for pooled in connections {
            let id = pooled.id();
            if let Err(e) = self.connector.close(pooled.into_inner()).await {
                warn!(connection_id = %id, error = %e, "Failed to close connection");
                failures.push(Error::connection_close(id, e.to_string()));
            }
        }
        failures
    }

    /// Returns leased connections to the idle set.
    ///
    /// Connections from a stopped or replaced generation are closed
    /// through the connector instead.
    fn release(self: &Arc<Self>, connections: Vec<PooledConnection<C::Connection>>, generation: u64) {
        let count = connections.len();
        let mut state = self.state.lock();

        if !state.running || state.generation != generation {
            drop(state);
            debug!(count, generation, "Closing connections from a stopped pool generation");
            self.discard(connections);
            return;
        }

        state.leased = state.leased.saturating_sub(count);
        state.idle.extend(connections);
        state.dispatch();

        trace!(count, leased = state.leased, idle = state.idle.len(), "Connections released");
    }

    /// Closes stale connections on a background task.
    fn discard(self: &Arc<Self>, connections: Vec<PooledConnection<C::Connection>>) {
        match Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(self);
                handle.spawn(async move {
                    // Failures are logged per connection.
                    let _ = shared.close_all(connections).await;
                });
            }
            Err(_) => {
                warn!(
                    count = connections.len(),
                    "No runtime to close stale connections, dropping them"
                );
            }
        }
    }
}

// ============================================================================
// ConnectionPool - Acquire
// ============================================================================

impl<C: Connector> ConnectionPool<C> {
    /// Borrows up to `batch_size` connections.
    ///
    /// The batch is capped at the number of idle connections; asking for
    /// more is never an error. If none are idle the call waits, first come
    /// first served, until a lease returns some. A stopped pool is started
    /// first. Uses the configured acquire timeout, if any.
    ///
    /// The connections go back to the pool when the returned [`Lease`]
    /// is dropped, including on error paths and panics.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `batch_size` is zero
    /// - [`Error::ConnectionSetup`] if an implicit start fails
    /// - [`Error::Timeout`] if the configured acquire timeout elapses
    pub async fn acquire(&self, batch_size: usize) -> Result<Lease<'_, C>> {
        match self.acquire_timeout {
            Some(limit) => self.acquire_timeout(batch_size, limit).await,
            None => self.acquire_inner(batch_size).await,
        }
    }

    /// Like [`acquire`](Self::acquire), but gives up after `limit`.
    ///
    /// A timed-out acquire holds no connections. An implicit start it
    /// triggered keeps running and fills the pool.
    ///
    /// # Errors
    ///
    /// As [`acquire`](Self::acquire), plus [`Error::Timeout`] on expiry.
    pub async fn acquire_timeout(&self, batch_size: usize, limit: Duration) -> Result<Lease<'_, C>> {
        timeout(limit, self.acquire_inner(batch_size))
            .await
            .map_err(|_| Error::timeout("acquire", limit.as_millis() as u64))?
    }

    async fn acquire_inner(&self, batch_size: usize) -> Result<Lease<'_, C>> {
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch size must be at least 1"));
        }

        loop {
            self.ensure_running().await?;

            let rx = {
                let mut state = self.shared.state.lock();
                if !state.running {
                    continue;
                }

                if state.waiters.is_empty() && !state.idle.is_empty() {
                    let connections = state.take(batch_size);
                    trace!(
                        requested = batch_size,
                        granted = connections.len(),
                        leased = state.leased,
                        "Connections leased"
                    );
                    return Ok(Lease::new(self, connections, state.generation));
                }

                // Drop acquires that timed out or were cancelled.
                state.waiters.retain(|w| !w.tx.is_closed());

                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(Waiter {
                    batch: batch_size,
                    tx,
                });
                debug!(
                    requested = batch_size,
                    queued = state.waiters.len(),
                    "Pool fully leased, waiting"
                );
                rx
            };

            let mut wait = Wait {
                pool: self,
                rx: Some(rx),
            };
            if let Some(grant) = wait.recv().await {
                return Ok(Lease::new(self, grant.connections, grant.generation));
            }
            // Pool was stopped while parked.
        }
    }
}

impl<C: Connector> fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("address", &self.shared.address)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Wait
// ============================================================================

/// A parked acquire's receiving end.
///
/// If the acquire is dropped after connections were handed over but
/// before it observed them, they are released on drop.
struct Wait<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    rx: Option<oneshot::Receiver<Grant<C::Connection>>>,
}

impl<C: Connector> Wait<'_, C> {
    /// Resolves to `None` if the pool stopped while waiting.
    async fn recv(&mut self) -> Option<Grant<C::Connection>> {
        let rx = self.rx.as_mut()?;
        let result = rx.await;
        self.rx = None;
        result.ok()
    }
}

impl<C: Connector> Drop for Wait<'_, C> {
    fn drop(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            return;
        };

        rx.close();
        if let Ok(grant) = rx.try_recv() {
            debug!(count = grant.connections.len(), "Returning connections of an abandoned acquire");
            self.pool.shared.release(grant.connections, grant.generation);
        }
    }
}

// ============================================================================
// Lease
// ============================================================================

/// A scoped batch of borrowed connections.
///
/// Dereferences to a slice of [`PooledConnection`]s. Dropping the lease
/// returns every connection to the pool. Connections are returned as-is;
/// one that failed while leased goes back to the idle set unchanged.
pub struct Lease<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    connections: Vec<PooledConnection<C::Connection>>,
    generation: u64,
}

impl<'a, C: Connector> Lease<'a, C> {
    fn new(
        pool: &'a ConnectionPool<C>,
        connections: Vec<PooledConnection<C::Connection>>,
        generation: u64,
    ) -> Self {
        Self {
            pool,
            connections,
            generation,
        }
    }

    /// Returns the identities of the borrowed connections.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(PooledConnection::id).collect()
    }

    /// Returns the connections to the pool now.
    #[inline]
    pub fn release(self) {
        drop(self);
    }
}

impl<C: Connector> Deref for Lease<'_, C> {
    type Target = [PooledConnection<C::Connection>];

    fn deref(&self) -> &Self::Target {
        &self.connections
    }
}

impl<C: Connector> DerefMut for Lease<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.connections
    }
}

impl<C: Connector> Drop for Lease<'_, C> {
    fn drop(&mut self) {
        let connections = mem::take(&mut self.connections);
        if !connections.is_empty() {
            self.pool.shared.release(connections, self.generation);
        }
    }
}

impl<C: Connector> fmt::Debug for Lease<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("ids", &self.ids())
            .field("generation", &self.generation)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
