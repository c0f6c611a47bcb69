use thiserror::Error;

/// Errors raised by a player backend while a connection is in use
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("MPD error: {0}")]
    Mpd(#[from] mpd::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Other(String),
}

/// Errors surfaced by the bridge core
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No live connection could be established within the retry budget
    #[error("Backend unavailable after {attempts} attempts: {source}")]
    BackendUnavailable {
        attempts: usize,
        #[source]
        source: BackendError,
    },

    #[error("Attribute '{0}' is not available")]
    MissingAttribute(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
