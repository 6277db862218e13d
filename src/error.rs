//! Error types for configuration and playback
use thiserror::Error;

/// Configuration rejected before any frame is driven
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The analyser produces fewer bins than there are bars to drive
    #[error("spectrum has {bins} bins but {bars} bars need one bin each")]
    SpectrumTooShort { bins: usize, bars: usize },

    /// A count that must be at least one was zero
    #[error("{0} must be greater than zero")]
    ZeroCount(&'static str),

    /// A numeric parameter outside its accepted range
    #[error("invalid value for {name}: {value}")]
    OutOfRange { name: &'static str, value: f64 },

    /// Config file could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// Config file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err.to_string())
    }
}

/// Playback failures, all terminal for the operation that raised them
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Malformed or unsupported audio data
    #[error("failed to decode '{title}': {reason}")]
    Decode { title: String, reason: String },

    /// The audio file could not be read from disk
    #[error("cannot read '{title}': {reason}")]
    Read { title: String, reason: String },

    /// The output device or sink could not be opened
    #[error("audio output error: {0}")]
    Output(String),
}
