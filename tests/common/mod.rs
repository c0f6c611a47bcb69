// Shared test utilities for integration tests
#![allow(dead_code)]

use mpdbridge::bridge::{Bridge, BusClient, MemoryBus, TopicScheme};
use mpdbridge::data::{ChangePolicy, PlayerSnapshots, Value};
use mpdbridge::error::BackendError;
use mpdbridge::players::{
    Attributes, BackendConnection, ChangeDispatcher, CommandExecutor, CommandHandler,
    ConnectionPool, Connector, Favourite, ItemMatch, PoolSettings, Watcher,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

/// A queue entry of the scripted backend
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: u32,
    pub file: String,
    pub tags: BTreeMap<String, String>,
}

impl QueueEntry {
    pub fn new(id: u32, file: &str, tags: &[(&str, &str)]) -> Self {
        Self {
            id,
            file: file.to_string(),
            tags: tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }
}

/// Everything the scripted backend reports and records
#[derive(Default)]
pub struct BackendState {
    pub status: Attributes,
    pub item: Attributes,
    pub queue: Vec<QueueEntry>,
    /// Control calls, in order, e.g. "set_volume(57)"
    pub calls: Vec<String>,
    pub connects: usize,
    pub status_queries: usize,
    pub fail_connect: bool,
    pub fail_status: bool,
    pub fail_wait: bool,
}

/// Connector for an in-memory player whose state tests can script
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub fn set_status(&self, key: &str, value: Value) {
        self.state().status.insert(key.to_string(), value);
    }

    pub fn remove_status(&self, key: &str) {
        self.state().status.remove(key);
    }

    pub fn set_item(&self, key: &str, value: Value) {
        self.state().item.insert(key.to_string(), value);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

pub struct ScriptedConnection {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedConnection {
    fn record(&self, call: String) -> Result<(), BackendError> {
        self.state.lock().unwrap().calls.push(call);
        Ok(())
    }
}

impl BackendConnection for ScriptedConnection {
    fn probe(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn query_status(&mut self) -> Result<Attributes, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.status_queries += 1;
        if state.fail_status {
            return Err(BackendError::Other("status unavailable".to_string()));
        }
        Ok(state.status.clone())
    }

    fn query_current_item(&mut self) -> Result<Attributes, BackendError> {
        Ok(self.state.lock().unwrap().item.clone())
    }

    fn wait_for_change(&mut self) -> Result<Vec<String>, BackendError> {
        thread::sleep(Duration::from_millis(5));
        if self.state.lock().unwrap().fail_wait {
            return Err(BackendError::Other("idle failed".to_string()));
        }
        Ok(vec!["player".to_string()])
    }

    fn set_play(&mut self, single_shot: bool) -> Result<(), BackendError> {
        self.record(format!("play(single={})", single_shot))
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.record("pause".to_string())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.record("stop".to_string())
    }

    fn skip_next(&mut self) -> Result<(), BackendError> {
        self.record("next".to_string())
    }

    fn set_single_mode(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.record(format!("single({})", enabled))
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), BackendError> {
        self.record(format!("set_volume({})", volume))
    }

    fn find_item(&mut self, tag: &str, value: &str) -> Result<Vec<ItemMatch>, BackendError> {
        let state = self.state.lock().unwrap();
        Ok(state.queue.iter()
            .filter(|entry| entry.tags.get(tag).map(|v| v == value).unwrap_or(false))
            .map(|entry| ItemMatch {
                id: Some(entry.id),
                file: entry.file.clone(),
                title: entry.tags.get("title").cloned(),
            })
            .collect())
    }

    fn play_item(&mut self, id: u32) -> Result<(), BackendError> {
        self.record(format!("play_item({})", id))
    }

    fn set_consume_mode(&mut self, enabled: bool) -> Result<(), BackendError> {
        self.record(format!("consume({})", enabled))
    }
}

impl Connector for ScriptedConnector {
    type Connection = ScriptedConnection;

    fn connect(&self) -> Result<ScriptedConnection, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.fail_connect {
            return Err(BackendError::Other("connection refused".to_string()));
        }
        Ok(ScriptedConnection { state: self.state.clone() })
    }

    fn address(&self) -> String {
        "scripted".to_string()
    }
}

/// Fully wired bridge over a scripted backend and an in-memory bus
pub struct Harness {
    pub backend: ScriptedConnector,
    pub bus: Arc<MemoryBus>,
    pub dispatcher: Arc<ChangeDispatcher>,
    pub executor: Arc<CommandExecutor<ScriptedConnector>>,
    pub watcher: Arc<Watcher<ScriptedConnector>>,
    pub bridge: Bridge,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_favourite(Favourite::default())
    }

    pub fn with_favourite(favourite: Favourite) -> Self {
        let backend = ScriptedConnector::new();
        let pool = Arc::new(ConnectionPool::with_settings(
            backend.clone(),
            PoolSettings::new(3, Duration::from_millis(1)),
        ));
        let dispatcher = Arc::new(ChangeDispatcher::new(PlayerSnapshots::shared(ChangePolicy::Strict)));
        let executor = Arc::new(
            CommandExecutor::new(pool.clone(), dispatcher.clone()).with_favourite(favourite),
        );
        let watcher = Arc::new(Watcher::new(pool, dispatcher.clone()));

        let bus = Arc::new(MemoryBus::new());
        let handler: Arc<dyn CommandHandler> = executor.clone();
        let bus_client: Arc<dyn BusClient> = bus.clone();
        let bridge = Bridge::new(bus_client, &TopicScheme::new("MPD"), &dispatcher, handler);

        Self { backend, bus, dispatcher, executor, watcher, bridge }
    }

    /// A backend playing one song at volume 40
    pub fn playing() -> Self {
        let harness = Self::new();
        harness.load_playing_state();
        harness
    }

    pub fn load_playing_state(&self) {
        let b = &self.backend;
        b.set_status("state", Value::from("play"));
        b.set_status("volume", Value::Int(40));
        b.set_status("repeat", Value::Bool(false));
        b.set_status("random", Value::Bool(false));
        b.set_status("single", Value::Bool(false));
        b.set_status("consume", Value::Bool(false));
        b.set_status("elapsed", Value::from("12.000"));
        b.set_item("file", Value::from("music/x.flac"));
        b.set_item("title", Value::from("X"));
        b.set_item("artist", Value::from("Y"));
        b.set_item("time", Value::Int(180));
    }

    /// Send a raw bus message through the subscription table
    pub fn send(&self, topic: &str, payload: &str) -> mpdbridge::error::BridgeResult<()> {
        self.bridge.subscriptions().handle_message(topic, payload.as_bytes())
    }

    pub fn published_topics(&self) -> Vec<String> {
        self.bus.published().into_iter().map(|(topic, _)| topic).collect()
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
