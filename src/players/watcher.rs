use crate::data::PlayerSnapshots;
use crate::error::{BackendError, BridgeError, BridgeResult};
use crate::players::backend::{BackendConnection, Connector};
use crate::players::dispatcher::ChangeDispatcher;
use crate::players::pool::ConnectionPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};
use std::thread::{self, JoinHandle};
use log::{debug, info, warn};

/// Mirrors backend state into the snapshots and dispatches the differences
///
/// Alternates between a refresh (status and current item query) and a
/// blocking wait for the next backend change. Errors in either phase are
/// logged and never end the loop.
pub struct Watcher<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    dispatcher: Arc<ChangeDispatcher>,
}

impl<C: Connector + 'static> Watcher<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self { pool, dispatcher }
    }

    /// Query the backend, update both snapshots and dispatch any changes
    ///
    /// A failed query leaves its snapshot untouched; the error is returned
    /// after the changes from the other query have been dispatched.
    pub fn refresh(&self) -> BridgeResult<usize> {
        let status = self.query("status", |conn| conn.query_status());
        let item = self.query("current item", |conn| conn.query_current_item());

        let mut first_error = None;
        let (status_changes, item_changes) = {
            let mut snapshots = self.lock_snapshots();
            match status {
                Ok(attributes) => snapshots.status.replace_all(attributes),
                Err(e) => { first_error.get_or_insert(e); },
            }
            match item {
                Ok(attributes) => snapshots.item.replace_all(attributes),
                Err(e) => { first_error.get_or_insert(e); },
            }
            (snapshots.status.drain_changes(), snapshots.item.drain_changes())
        };

        let dispatched = if status_changes.is_empty() && item_changes.is_empty() {
            debug!("Refresh found no changes");
            0
        } else {
            self.dispatcher.dispatch(&status_changes, &item_changes)
        };

        match first_error {
            Some(e) => Err(e),
            None => Ok(dispatched),
        }
    }

    /// Block until the backend reports a change
    pub fn wait(&self) -> BridgeResult<Vec<String>> {
        let mut connection = self.pool.acquire()?;
        let subsystems = connection.wait_for_change()?;
        Ok(subsystems)
    }

    /// Run the refresh/wait cycle until `running` is cleared
    ///
    /// The first refresh establishes the baseline and emits the events
    /// implied by the initial state.
    pub fn run(&self, running: &AtomicBool) {
        info!("Watcher started for {}", self.pool.connector().address());
        while running.load(Ordering::SeqCst) {
            if let Err(e) = self.refresh() {
                warn!("Refresh failed: {}", e);
            }
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match self.wait() {
                Ok(subsystems) => debug!("Backend reported changes in: {}", subsystems.join(", ")),
                Err(e) => warn!("Waiting for backend changes failed, refreshing anyway: {}", e),
            }
        }
        info!("Watcher stopped");
    }

    /// Run the watcher on its own thread
    pub fn start(self: Arc<Self>, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("mpd-watcher".to_string())
            .spawn(move || self.run(&running))
    }

    /// acquire, call, drop
    fn query<T, F>(&self, what: &str, op: F) -> BridgeResult<T>
    where
        F: FnOnce(&mut C::Connection) -> Result<T, BackendError>,
    {
        let mut connection = self.pool.acquire()?;
        op(&mut *connection).map_err(|e| {
            warn!("Backend {} query failed: {}", what, e);
            BridgeError::from(e)
        })
    }

    fn lock_snapshots(&self) -> MutexGuard<'_, PlayerSnapshots> {
        match self.dispatcher.snapshots().lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
