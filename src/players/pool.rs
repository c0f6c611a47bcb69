use crate::error::{BridgeError, BridgeResult};
use crate::helpers::retry::RetryHandler;
use crate::players::backend::{BackendConnection, Connector};
use serde::{Serialize, Deserialize};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::time::Duration;
use log::{debug, info, warn};

/// Retry budget for opening new connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Connection attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay between two attempts, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_attempts() -> usize {
    10
}

fn default_retry_delay_ms() -> u64 {
    5000
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl PoolSettings {
    pub fn new(max_attempts: usize, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay_ms: retry_delay.as_millis() as u64,
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Pool of reusable backend connections
///
/// Connections are created on demand and validated with a probe before they
/// are handed out. The pool is shared by the watcher thread and the command
/// path, so the free-list and the creation path are each guarded by a lock.
pub struct ConnectionPool<C: Connector> {
    connector: C,
    settings: PoolSettings,
    idle: Mutex<Vec<C::Connection>>,
    /// Serializes connection creation
    creating: Mutex<()>,
}

impl<C: Connector> ConnectionPool<C> {
    pub fn new(connector: C) -> Self {
        Self::with_settings(connector, PoolSettings::default())
    }

    pub fn with_settings(connector: C, settings: PoolSettings) -> Self {
        debug!("Creating connection pool for {} ({} attempts, {:?} between attempts)",
            connector.address(), settings.max_attempts, settings.retry_delay());
        Self {
            connector,
            settings,
            idle: Mutex::new(Vec::new()),
            creating: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Number of connections currently waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Borrow a connection that has just passed a liveness probe
    ///
    /// Idle connections are reused first; stale ones are discarded without
    /// using up the retry budget. New connections are attempted
    /// `max_attempts` times with `retry_delay` between attempts.
    pub fn acquire(&self) -> BridgeResult<PooledConnection<'_, C>> {
        if let Some(connection) = self.take_live_idle() {
            return Ok(PooledConnection::new(self, connection));
        }

        let attempts = self.settings.max_attempts.max(1);
        let mut retry = RetryHandler::fixed(attempts, self.settings.retry_delay());
        let operation = format!("connection to {}", self.connector.address());

        retry.execute_with_retry(|_| self.create_validated(), &operation)
            .map(|connection| PooledConnection::new(self, connection))
            .map_err(|source| BridgeError::BackendUnavailable { attempts, source })
    }

    /// Return a connection to the pool
    ///
    /// The connection is kept regardless of how the borrower's call went; a
    /// broken one fails its next probe and is discarded then.
    pub fn release(&self, connection: C::Connection) {
        match self.idle.lock() {
            Ok(mut idle) => idle.push(connection),
            Err(poisoned) => poisoned.into_inner().push(connection),
        }
    }

    /// Pop idle connections until one passes the probe
    fn take_live_idle(&self) -> Option<C::Connection> {
        while let Some(mut connection) = self.pop_idle() {
            match connection.probe() {
                Ok(()) => return Some(connection),
                Err(e) => {
                    debug!("Discarding stale pooled connection: {}", e);
                    Self::discard(connection);
                }
            }
        }
        None
    }

    fn pop_idle(&self) -> Option<C::Connection> {
        match self.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        }
    }

    /// One creation attempt
    fn create_validated(&self) -> Result<C::Connection, crate::error::BackendError> {
        let _creating = match self.creating.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        // Another borrower may have returned a connection while we waited
        if let Some(connection) = self.take_live_idle() {
            return Ok(connection);
        }

        let mut connection = self.connector.connect()?;
        match connection.probe() {
            Ok(()) => {
                info!("Opened new connection to {}", self.connector.address());
                Ok(connection)
            },
            Err(e) => {
                warn!("New connection to {} failed liveness probe: {}", self.connector.address(), e);
                Self::discard(connection);
                Err(e)
            }
        }
    }

    fn discard(mut connection: C::Connection) {
        if let Err(e) = connection.close() {
            debug!("Error while closing discarded connection: {}", e);
        }
    }
}

/// A connection checked out of a [`ConnectionPool`]
///
/// Goes back to the pool when dropped.
pub struct PooledConnection<'a, C: Connector> {
    pool: &'a ConnectionPool<C>,
    connection: Option<C::Connection>,
}

impl<'a, C: Connector> PooledConnection<'a, C> {
    fn new(pool: &'a ConnectionPool<C>, connection: C::Connection) -> Self {
        Self {
            pool,
            connection: Some(connection),
        }
    }
}

impl<C: Connector> Deref for PooledConnection<'_, C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        // Only taken in drop
        self.connection.as_ref().unwrap()
    }
}

impl<C: Connector> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut().unwrap()
    }
}

impl<C: Connector> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
