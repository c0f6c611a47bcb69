pub mod mpd;

pub use self::mpd::{MpdConnection, MpdConnector};
