//! Unified crate-level error type.
//!
//! A single [`SessionError`] is used across framing, decoding, scheduling and
//! the HTTP source, with a [`SessionResult`] alias. Variants map onto the
//! distinct user-facing failure classes: a corrupt or malformed stream, a
//! clip that is not valid audio, an empty result, and transport failure.
//!
//! Note: network-facing variants intentionally stay string-based to avoid
//! pulling concrete HTTP client error types into the public API.

use std::io;

/// Result type used by this crate.
pub type SessionResult<T> = Result<T, SessionError>;

/// Unified error type for `tts-clip-stream`.
///
/// Every error is fatal to its session: the playback scheduler is stopped and
/// any partially accumulated clips are discarded, so a corrupted session is
/// never partially played or offered for download.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The inbound byte stream is malformed: a frame length implies an
    /// unreasonable payload, trailing undecodable bytes remained after the
    /// transport closed, or the server returned a bad response.
    #[error("corrupt clip stream: {0}")]
    StreamCorruption(String),

    /// A framed payload is not a valid audio container.
    ///
    /// Skipping the clip would break the gapless-timing invariant, so this is
    /// fatal rather than recoverable.
    #[error("clip decode failed: {0}")]
    ClipDecode(String),

    /// The stream closed with zero successfully decoded clips.
    #[error("stream ended with no decoded audio")]
    EmptyResult,

    /// Transport-level failure before or while reading the response body.
    #[error("service unreachable: {0}")]
    Network(String),

    /// Invalid synthesis request rejected before any network activity.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The download buffer was requested before the stream ended.
    #[error("session is not finished")]
    NotFinished,

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Map an error surfaced by a byte source into the session taxonomy.
    ///
    /// Sources report bad server responses as `InvalidData` ("bad response")
    /// and transport failures as any other kind ("service unreachable").
    pub fn from_source(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidData => SessionError::StreamCorruption(err.to_string()),
            _ => SessionError::Network(err.to_string()),
        }
    }
}
