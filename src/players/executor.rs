use crate::data::PlayerCommand;
use crate::error::{BackendError, BridgeError, BridgeResult};
use crate::players::backend::{BackendConnection, Connector};
use crate::players::dispatcher::ChangeDispatcher;
use crate::players::pool::ConnectionPool;
use serde::{Serialize, Deserialize};
use std::sync::Arc;
use log::{debug, info, warn};

/// Something that can run bus commands
pub trait CommandHandler: Send + Sync {
    /// Run a command
    ///
    /// Returns `InvalidArgument` for malformed payloads; no backend call is
    /// made in that case.
    fn execute(&self, command: PlayerCommand) -> BridgeResult<()>;
}

/// Tag and search text identifying the favourite item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favourite {
    /// Tag to match, e.g. "name" for radio streams or "title"
    #[serde(default = "default_favourite_tag")]
    pub tag: String,

    /// Exact value the tag must have
    #[serde(default)]
    pub text: String,
}

fn default_favourite_tag() -> String {
    "name".to_string()
}

impl Default for Favourite {
    fn default() -> Self {
        Self {
            tag: default_favourite_tag(),
            text: String::new(),
        }
    }
}

impl Favourite {
    pub fn new(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: text.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.tag.is_empty() && !self.text.is_empty()
    }
}

/// Parse a volume payload, clamping it to 0-100
pub fn parse_volume(text: &str) -> BridgeResult<u8> {
    let level: i64 = text.trim().parse()
        .map_err(|_| BridgeError::InvalidArgument(format!("volume '{}' is not an integer", text.trim())))?;
    Ok(level.clamp(0, 100) as u8)
}

/// Runs player control operations on pooled connections
///
/// Every operation borrows one connection for its backend calls and returns
/// it afterwards; there is no retry beyond what acquiring provides.
pub struct CommandExecutor<C: Connector> {
    pool: Arc<ConnectionPool<C>>,
    dispatcher: Arc<ChangeDispatcher>,
    favourite: Favourite,
}

impl<C: Connector> CommandExecutor<C> {
    pub fn new(pool: Arc<ConnectionPool<C>>, dispatcher: Arc<ChangeDispatcher>) -> Self {
        Self {
            pool,
            dispatcher,
            favourite: Favourite::default(),
        }
    }

    pub fn with_favourite(mut self, favourite: Favourite) -> Self {
        self.favourite = favourite;
        self
    }

    pub fn favourite(&self) -> &Favourite {
        &self.favourite
    }

    /// Start playback, leaving stop-after-current mode
    pub fn play(&self) -> BridgeResult<()> {
        self.with_connection("play", |conn| conn.set_play(false))
    }

    pub fn pause(&self) -> BridgeResult<()> {
        self.with_connection("pause", |conn| conn.pause())
    }

    pub fn stop(&self) -> BridgeResult<()> {
        self.with_connection("stop", |conn| conn.stop())
    }

    /// Let the current item finish, then stop
    pub fn stop_after_current(&self) -> BridgeResult<()> {
        self.with_connection("stop after current", |conn| conn.set_single_mode(true))
    }

    pub fn next(&self) -> BridgeResult<()> {
        self.with_connection("next", |conn| conn.skip_next())
    }

    pub fn set_volume(&self, text: &str) -> BridgeResult<()> {
        let volume = match parse_volume(text) {
            Ok(volume) => volume,
            Err(e) => {
                warn!("Ignoring volume command: {}", e);
                return Err(e);
            }
        };
        self.with_connection("set volume", |conn| conn.set_volume(volume))
    }

    /// Make the first queue entry matching the favourite the active item
    ///
    /// No match, or no favourite configured, is not an error.
    pub fn play_favourite(&self) -> BridgeResult<()> {
        if !self.favourite.is_configured() {
            debug!("No favourite configured, ignoring favourite command");
            return Ok(());
        }
        let Favourite { tag, text } = &self.favourite;

        self.with_connection("play favourite", |conn| {
            let matches = conn.find_item(tag, text)?;
            match matches.iter().find_map(|item| item.id) {
                Some(id) => {
                    info!("Playing favourite {}='{}' (id {})", tag, text, id);
                    // Keep the favourite in the queue once it has played
                    conn.set_consume_mode(false)?;
                    conn.play_item(id)
                },
                None => {
                    debug!("No queue entry with {}='{}'", tag, text);
                    Ok(())
                }
            }
        })
    }

    /// Publish the current value of every attribute
    pub fn query(&self) -> BridgeResult<()> {
        let emitted = self.dispatcher.emit_all();
        debug!("Query answered with {} events", emitted);
        Ok(())
    }

    /// acquire, call, drop
    fn with_connection<T, F>(&self, operation: &str, op: F) -> BridgeResult<T>
    where
        F: FnOnce(&mut C::Connection) -> Result<T, BackendError>,
    {
        debug!("Executing {}", operation);
        let mut connection = self.pool.acquire()?;
        op(&mut *connection).map_err(|e| {
            warn!("Backend call for {} failed: {}", operation, e);
            BridgeError::from(e)
        })
    }
}

impl<C: Connector> CommandHandler for CommandExecutor<C> {
    fn execute(&self, command: PlayerCommand) -> BridgeResult<()> {
        info!("Received command: {}", command);
        match command {
            PlayerCommand::Query => self.query(),
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::Stop => self.stop(),
            PlayerCommand::StopAfterCurrent => self.stop_after_current(),
            PlayerCommand::Next => self.next(),
            PlayerCommand::PlayFavourite => self.play_favourite(),
            PlayerCommand::SetVolume(level) => self.set_volume(&level),
        }
    }
}
