use crate::data::Value;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current-item attributes carried by a song change
pub const SONG_EVENT_KEYS: [&str; 6] = ["album", "artist", "file", "time", "title", "track"];

/// Semantic events derived from attribute changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// The now-playing item changed; carries the whitelisted song attributes
    SongChanged {
        song: BTreeMap<String, Value>,
    },

    /// Playback state changed (play, pause, stop)
    PlaybackStateChanged {
        state: Value,
    },

    /// Elapsed time of the current item changed
    ElapsedChanged {
        elapsed: Value,
    },

    VolumeChanged {
        volume: Value,
    },

    /// Repeat or random flag changed
    PlayModeChanged {
        repeat: Value,
        random: Value,
    },

    /// Single (stop after current) flag changed
    SingleModeChanged {
        single: Value,
    },
}

impl fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerEvent::SongChanged { song } => {
                let title = song.get("title").map(|v| v.to_string()).unwrap_or_default();
                write!(f, "song:{}", title)
            },
            PlayerEvent::PlaybackStateChanged { state } => write!(f, "state:{}", state),
            PlayerEvent::ElapsedChanged { elapsed } => write!(f, "elapsed:{}", elapsed),
            PlayerEvent::VolumeChanged { volume } => write!(f, "volume:{}", volume),
            PlayerEvent::PlayModeChanged { repeat, random } => {
                write!(f, "play_mode:repeat={},random={}", repeat, random)
            },
            PlayerEvent::SingleModeChanged { single } => write!(f, "single:{}", single),
        }
    }
}
