//! Byte-source abstraction for the clip stream.
//!
//! The session consumes an **ordered** stream of [`SourceMsg`] items:
//! - `SourceMsg::Data(Bytes)` carries framed clip bytes in arrival order,
//!   chunked however the transport chunks them.
//! - `SourceMsg::EndOfStream` terminates the byte stream. A source stream
//!   that simply ends (`None`) is treated identically, since the wire format
//!   has no in-band end marker.
//!
//! Error convention: sources report a bad server response as an `io::Error`
//! of kind `InvalidData` and transport failures as any other kind; the
//! session maps these onto the error taxonomy via
//! [`crate::SessionError::from_source`].
//!
//! Concrete sources live in submodules; `http` posts a synthesis request and
//! streams the response body.

use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// An ordered message emitted by a [`ClipByteSource`].
#[derive(Debug, Clone)]
pub enum SourceMsg {
    /// Framed clip bytes in arrival order.
    Data(Bytes),

    /// Upstream finished.
    EndOfStream,
}

/// Convenience type for boxed sources.
pub type BoxClipSource = Box<dyn ClipByteSource>;

/// A source yielding the framed clip byte stream.
///
/// Implementations do any network I/O internally. Returning a stream lets a
/// source pick its own concurrency model; cancellation is handled by
/// dropping the stream.
pub trait ClipByteSource: Send + 'static {
    /// A human-readable name, used for diagnostics/logging.
    fn name(&self) -> &'static str;

    /// Create the ordered message stream.
    fn into_stream(self: Box<Self>) -> Pin<Box<dyn Stream<Item = io::Result<SourceMsg>> + Send>>;
}

pub mod http;
