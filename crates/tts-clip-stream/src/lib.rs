//! Incremental TTS clip streaming, gapless scheduling, and WAV export.
//!
//! A synthesis backend streams length-prefixed WAV clips over one HTTP
//! response body. This crate demultiplexes that byte stream into complete
//! clips as they arrive, decodes each clip to float PCM, schedules playback
//! so consecutive clips are sample-accurate gapless, and concatenates
//! everything into a single downloadable WAV once the stream ends. The
//! implementation details live in dedicated modules; this file only wires
//! modules and re-exports.

mod backend;
mod decode;
mod error;
mod frame;
mod scheduler;
mod session;
mod source;
mod types;
mod wav;

#[cfg(feature = "rodio")]
mod rodio;

// Public API re-exports.
pub use crate::backend::{
    BackendConfig, RequestBodyBuilder, SynthesisRequest, DEFAULT_MAX_TEXT_CHARS,
    DEFAULT_VOICE_DESCRIPTION,
};
pub use crate::decode::{ClipDecoder, SymphoniaClipDecoder};
pub use crate::error::{SessionError, SessionResult};
pub use crate::frame::{FrameDecoder, LENGTH_PREFIX_BYTES};
pub use crate::scheduler::{
    ClipSink, Clock, MonotonicClock, PlaybackScheduler, ScheduledClip,
};
pub use crate::session::StreamSession;
pub use crate::source::http::HttpClipSource;
pub use crate::source::{BoxClipSource, ClipByteSource, SourceMsg};
pub use crate::types::{
    AudioSpec, DecodedClip, ProgressCallback, ProgressUpdate, SessionMsg, SessionOptions,
    SessionState,
};
pub use crate::wav::{encode_wav, DOWNLOAD_FILE_NAME};

#[cfg(feature = "rodio")]
pub use crate::rodio::RodioClipSink;
