use crate::data::Value;
use crate::error::BackendError;
use std::collections::BTreeMap;

/// Attributes returned by one status or current-item query
pub type Attributes = BTreeMap<String, Value>;

/// A queue entry returned by a favourite lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemMatch {
    /// Queue id, if the backend assigned one
    pub id: Option<u32>,
    pub file: String,
    pub title: Option<String>,
}

/// One session with the player backend
///
/// A connection is owned by exactly one caller at a time; the pool hands it
/// out and takes it back.
pub trait BackendConnection: Send {
    /// Lightweight liveness check
    fn probe(&mut self) -> Result<(), BackendError>;

    /// Close the session cleanly; the connection is dropped afterwards
    fn close(&mut self) -> Result<(), BackendError>;

    fn query_status(&mut self) -> Result<Attributes, BackendError>;

    /// Attributes of the now-playing item, empty if nothing is loaded
    fn query_current_item(&mut self) -> Result<Attributes, BackendError>;

    /// Block until the backend reports a change; returns the changed subsystems
    fn wait_for_change(&mut self) -> Result<Vec<String>, BackendError>;

    /// Start playback, optionally stopping after the current item
    fn set_play(&mut self, single_shot: bool) -> Result<(), BackendError>;

    fn pause(&mut self) -> Result<(), BackendError>;

    fn stop(&mut self) -> Result<(), BackendError>;

    fn skip_next(&mut self) -> Result<(), BackendError>;

    fn set_single_mode(&mut self, enabled: bool) -> Result<(), BackendError>;

    /// Set the volume (0-100)
    fn set_volume(&mut self, volume: u8) -> Result<(), BackendError>;

    /// Items whose `tag` equals `value`, in backend order
    fn find_item(&mut self, tag: &str, value: &str) -> Result<Vec<ItemMatch>, BackendError>;

    fn play_item(&mut self, id: u32) -> Result<(), BackendError>;

    fn set_consume_mode(&mut self, enabled: bool) -> Result<(), BackendError>;
}

/// Opens new sessions with the backend
pub trait Connector: Send + Sync {
    type Connection: BackendConnection;

    /// Connect and, if a secret is configured, authenticate
    fn connect(&self) -> Result<Self::Connection, BackendError>;

    /// Human readable address for log messages
    fn address(&self) -> String;
}
