//! Test fixtures for session integration tests.
//!
//! The fixture server speaks the real backend protocol: a POST endpoint that
//! answers with one chunked response body carrying length-prefixed WAV clips.
//! Clip payloads are generated on the fly so the tests exercise the actual
//! decode path rather than canned byte strings.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use tts_clip_stream::{ClipSink, DecodedClip};

/// Generate a complete 16-bit PCM WAV file containing a sine wave.
///
/// WAV is trivial to emit without external dependencies and Symphonia
/// decodes it, which makes it the natural clip payload for these tests.
pub fn generate_sine_wav(
    freq_hz: f32,
    num_samples: usize,
    sample_rate: u32,
    channels: u16,
) -> Vec<u8> {
    let data_len = num_samples * channels as usize * 2;
    let mut wav = Vec::with_capacity(44 + data_len);

    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&((36 + data_len) as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    let block_align = channels * 2;
    wav.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_len as u32).to_le_bytes());
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample = (0.4 * (2.0 * std::f32::consts::PI * freq_hz * t).sin() * 32767.0) as i16;
        for _ in 0..channels {
            wav.extend_from_slice(&sample.to_le_bytes());
        }
    }
    wav
}

/// Wrap a clip payload in the wire framing: `[u32 LE length][payload]`.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(4 + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// The zero-length flush sentinel.
pub fn flush_sentinel() -> Vec<u8> {
    vec![0, 0, 0, 0]
}

/// Spawn an axum server whose synthesis endpoint streams `body` in small
/// chunks, deliberately misaligned with frame boundaries.
///
/// Returns the bound address; the server lives until the test process exits.
pub async fn spawn_streaming_server(body: Vec<u8>) -> SocketAddr {
    let chunks: Vec<Bytes> = body.chunks(7).map(Bytes::copy_from_slice).collect();
    let app = Router::new().route(
        "/synthesize/design",
        post(move || {
            let chunks = chunks.clone();
            async move {
                Body::from_stream(futures_util::stream::iter(
                    chunks.into_iter().map(Ok::<_, Infallible>),
                ))
            }
        }),
    );
    serve(app).await
}

/// Spawn a server that sends `first` and then stalls without closing the
/// response, so the session stays mid-stream until stopped.
pub async fn spawn_stalling_server(first: Vec<u8>) -> SocketAddr {
    let first = Bytes::from(first);
    let app = Router::new().route(
        "/synthesize/design",
        post(move || {
            let first = first.clone();
            async move {
                Body::from_stream(futures_util::stream::unfold(0u8, move |step| {
                    let first = first.clone();
                    async move {
                        match step {
                            0 => Some((Ok::<_, Infallible>(first), 1)),
                            _ => {
                                tokio::time::sleep(Duration::from_secs(30)).await;
                                None
                            }
                        }
                    }
                }))
            }
        }),
    );
    serve(app).await
}

/// Spawn a server that rejects the synthesis request with the given status.
pub async fn spawn_error_server(status: StatusCode) -> SocketAddr {
    let app = Router::new().route(
        "/synthesize/design",
        post(move || async move { (status, "synthesis failed").into_response() }),
    );
    serve(app).await
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture server");
    let addr = listener.local_addr().expect("fixture server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    addr
}

/// Records every `play_at` call so tests can assert scheduling order and
/// stop behavior without an audio device.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<SinkLog>>,
}

#[derive(Default)]
struct SinkLog {
    played: Vec<(f64, usize)>,
    stop_calls: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(start_time, frames)` for every clip handed to the sink, in order.
    pub fn played(&self) -> Vec<(f64, usize)> {
        self.inner.lock().unwrap().played.clone()
    }

    pub fn stop_calls(&self) -> usize {
        self.inner.lock().unwrap().stop_calls
    }
}

impl ClipSink for RecordingSink {
    fn play_at(&mut self, clip: &DecodedClip, start_time: f64) {
        self.inner
            .lock()
            .unwrap()
            .played
            .push((start_time, clip.frames()));
    }

    fn stop_all(&mut self) {
        self.inner.lock().unwrap().stop_calls += 1;
    }
}
