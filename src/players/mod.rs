/// Backend access, change detection and player control
pub mod backend;
pub mod dispatcher;
pub mod executor;
pub mod mpd;
pub mod pool;
pub mod watcher;

// Re-export the main components
pub use backend::{Attributes, BackendConnection, Connector, ItemMatch};
pub use dispatcher::{ChangeDispatcher, EventKind, EventSink};
pub use executor::{CommandExecutor, CommandHandler, Favourite};
pub use self::mpd::{MpdConnection, MpdConnector};
pub use pool::{ConnectionPool, PoolSettings, PooledConnection};
pub use watcher::Watcher;
