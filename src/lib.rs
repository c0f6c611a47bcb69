/// Attribute values, snapshots, events and commands
pub mod data;

/// Backend connection pool, watcher, dispatcher and command executor
pub mod players;

/// Publish/subscribe wiring and the MQTT transport
pub mod bridge;

/// Helper utilities
pub mod helpers;

pub mod config;
pub mod error;
pub mod logging;

pub use bridge::{Bridge, BusClient, MemoryBus, SubscriptionTable, TopicScheme};
pub use config::BridgeConfig;
pub use data::{ChangePolicy, PlayerCommand, PlayerEvent, Snapshot, Value};
pub use error::{BackendError, BridgeError, BridgeResult};
pub use players::{ChangeDispatcher, CommandExecutor, ConnectionPool, Watcher};
