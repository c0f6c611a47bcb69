// Commands accepted from the bus
use crate::error::{BridgeError, BridgeResult};
use serde::{Serialize, Deserialize};
use strum_macros::EnumString;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum PlayerCommand {
    /// Publish the current value of every attribute
    #[strum(serialize = "query")]
    Query,

    #[strum(serialize = "play")]
    Play,

    #[strum(serialize = "pause")]
    Pause,

    #[strum(serialize = "stop")]
    Stop,

    /// Stop once the current item has finished
    #[serde(rename = "stop after")]
    #[strum(serialize = "stop after")]
    StopAfterCurrent,

    #[strum(serialize = "next")]
    Next,

    /// Play the configured favourite
    #[strum(serialize = "fav")]
    PlayFavourite,

    /// Set the volume; the payload is parsed when the command runs
    #[serde(rename = "volume")]
    #[strum(disabled)]
    SetVolume(String),
}

impl PlayerCommand {
    /// Parse a payload received on the command topic
    pub fn from_payload(payload: &str) -> BridgeResult<Self> {
        PlayerCommand::from_str(payload.trim())
            .map_err(|_| BridgeError::InvalidArgument(format!("unknown command '{}'", payload.trim())))
    }
}

impl std::fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerCommand::Query => write!(f, "query"),
            PlayerCommand::Play => write!(f, "play"),
            PlayerCommand::Pause => write!(f, "pause"),
            PlayerCommand::Stop => write!(f, "stop"),
            PlayerCommand::StopAfterCurrent => write!(f, "stop after"),
            PlayerCommand::Next => write!(f, "next"),
            PlayerCommand::PlayFavourite => write!(f, "fav"),
            PlayerCommand::SetVolume(level) => write!(f, "volume:{}", level),
        }
    }
}
