// Data structures for the MPD bridge

pub mod player_command;
pub mod player_event;
pub mod snapshot;
pub mod value;

// Re-export types from child modules
pub use player_command::*;
pub use player_event::*;
pub use snapshot::*;
pub use value::*;
