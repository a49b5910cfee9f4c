//! Failures raised by the playback capabilities.
//!
//! None of these ever cross the boundary of the playback thread: the run loop
//! logs them and retires its context. Control calls only report `bool`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// The stream could not be reached, or the URL was malformed.
    #[error("cannot connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    /// The decoder could not negotiate a PCM target for the stream.
    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),

    /// No output device or line could be obtained.
    #[error("output line unavailable: {0}")]
    LineUnavailable(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("stream i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Cooperative stop request; not a real failure.
    #[error("playback cancelled")]
    Cancelled,
}

impl PlayerError {
    pub fn connection(url: &str, reason: impl ToString) -> Self {
        Self::Connection {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type PlayerResult<T> = std::result::Result<T, PlayerError>;
