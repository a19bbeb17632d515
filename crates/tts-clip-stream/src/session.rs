//! Stream session orchestration.
//!
//! A [`StreamSession`] owns the full lifecycle of one synthesis request:
//! reading the source byte stream, framing, decoding clips, scheduling them
//! gaplessly, accumulating them for the final WAV, and signalling progress
//! and completion.
//!
//! # Contract
//! - Consumers iterate an ordered stream of `Result<SessionMsg, SessionError>`.
//! - Clips are scheduled strictly in frame order. Framing continues while an
//!   earlier clip is still decoding (complete payloads queue in a bounded
//!   channel), but delivery to the scheduler is serialized by frame sequence,
//!   never by decode-completion order.
//! - `stop()` (or dropping the session) silences all scheduled audio,
//!   discards any in-flight decode results, and suppresses the completion
//!   signal. Starting a new session therefore requires nothing beyond
//!   dropping or stopping the previous one.
//! - Any fatal error is surfaced exactly once; the scheduler is stopped and
//!   accumulated clips are discarded, so a corrupted session is never
//!   partially played or offered for download.
//!
//! This type owns a single background streaming task (plus a short-lived
//! blocking decode task per frame) and guarantees the ordered output channel
//! closes on termination, so consumers are never left hanging.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::decode::{ClipDecoder, SymphoniaClipDecoder};
use crate::error::{SessionError, SessionResult};
use crate::frame::FrameDecoder;
use crate::scheduler::{ClipSink, Clock, MonotonicClock, PlaybackScheduler};
use crate::source::{BoxClipSource, SourceMsg};
use crate::types::{DecodedClip, ProgressUpdate, SessionMsg, SessionOptions, SessionState};
use crate::wav::encode_wav;

/// The aggregate state of one generation request.
///
/// At most one session should be active per output sink; the cancellation
/// rule (stop/drop tears down all scheduled audio) enforces exclusive write
/// access to the shared audio output without locks.
pub struct StreamSession {
    rx: mpsc::Receiver<SessionResult<SessionMsg>>,
    cancel: CancellationToken,
    streaming_task: tokio::task::JoinHandle<()>,
    shared: Arc<SessionShared>,
}

struct SessionShared {
    state: Mutex<SessionState>,
    scheduler: Mutex<PlaybackScheduler>,
    clips: Mutex<Vec<DecodedClip>>,
}

impl SessionShared {
    fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap() = next;
    }

    /// Enter `Draining`, but only from `Streaming`: a stop or failure that
    /// landed in the meantime must not be overwritten.
    fn begin_draining(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Streaming {
            *state = SessionState::Draining;
            true
        } else {
            false
        }
    }

    /// Enter a terminal failure: stop playback, discard the partial
    /// concatenation buffer, mark the session failed.
    fn fail(&self) {
        self.scheduler.lock().unwrap().stop();
        self.clips.lock().unwrap().clear();
        self.set_state(SessionState::Failed);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        // Replacing a session must never leave audio of the old one playing.
        self.cancel.cancel();
        self.shared.scheduler.lock().unwrap().stop();
        self.streaming_task.abort();
    }
}

impl StreamSession {
    /// Start a session with the default clip decoder and monotonic clock.
    pub fn start(source: BoxClipSource, sink: Box<dyn ClipSink>, opts: SessionOptions) -> Self {
        Self::start_with(
            source,
            sink,
            Arc::new(SymphoniaClipDecoder::new()),
            Arc::new(MonotonicClock::new()),
            opts,
        )
    }

    /// Core constructor with explicit decoder and clock seams.
    pub fn start_with(
        source: BoxClipSource,
        sink: Box<dyn ClipSink>,
        decoder: Arc<dyn ClipDecoder>,
        clock: Arc<dyn Clock>,
        opts: SessionOptions,
    ) -> Self {
        // Ordered session output. Bounded to provide consumer backpressure.
        let (msg_tx, rx) = mpsc::channel::<SessionResult<SessionMsg>>(32);

        let cancel = CancellationToken::new();
        let scheduler =
            PlaybackScheduler::new(clock, sink, opts.schedule_epsilon.as_secs_f64());
        let shared = Arc::new(SessionShared {
            state: Mutex::new(SessionState::Streaming),
            scheduler: Mutex::new(scheduler),
            clips: Mutex::new(Vec::new()),
        });

        if let Some(cb) = opts.on_progress.clone() {
            spawn_progress_ticker(
                shared.clone(),
                cancel.clone(),
                opts.progress_interval,
                cb,
            );
        }

        // Complete frame payloads queue here while earlier clips decode.
        let (frame_tx, frame_rx) =
            mpsc::channel::<Bytes>(opts.frame_queue_capacity.get());

        let decode_task = tokio::spawn(decode_loop(
            frame_rx,
            decoder,
            shared.clone(),
            msg_tx.clone(),
            cancel.clone(),
        ));

        let source_name = source.name();
        let cancel_bg = cancel.clone();
        let shared_bg = shared.clone();
        let max_frame_bytes = opts.max_frame_bytes.get();
        let streaming_task = tokio::spawn(async move {
            tracing::debug!(source = source_name, "session streaming task started");
            let mut s = source.into_stream();
            let mut framer = FrameDecoder::new(max_frame_bytes);

            // Fatal error observed while reading/framing, if any.
            let mut fatal: Option<SessionError> = None;

            loop {
                tokio::select! {
                    _ = cancel_bg.cancelled() => break,
                    item = s.next() => match item {
                        Some(Ok(SourceMsg::Data(bytes))) => match framer.feed(&bytes) {
                            Ok(frames) => {
                                let mut closed = false;
                                for payload in frames {
                                    if frame_tx.send(payload).await.is_err() {
                                        // Decode side ended early (stop/fail).
                                        closed = true;
                                        break;
                                    }
                                }
                                if closed {
                                    break;
                                }
                            }
                            Err(e) => {
                                fatal = Some(e);
                                break;
                            }
                        },
                        // The transport closing the stream *is* end-of-stream;
                        // an explicit message and a terminated stream are
                        // treated identically.
                        Some(Ok(SourceMsg::EndOfStream)) | None => {
                            if let Err(e) = framer.finish() {
                                fatal = Some(e);
                            }
                            break;
                        }
                        Some(Err(e)) => {
                            fatal = Some(SessionError::from_source(e));
                            break;
                        }
                    }
                }
            }

            // No more frames will be queued; let the decode loop drain what
            // is already in flight (unless we are failing or cancelled).
            drop(frame_tx);

            let decode_result = match decode_task.await {
                Ok(r) => r,
                Err(e) => Err(SessionError::ClipDecode(format!(
                    "decode task aborted: {e}"
                ))),
            };
            let fatal = fatal.or_else(|| decode_result.err());

            if let Some(e) = fatal {
                tracing::error!(error = %e, "session failed");
                shared_bg.fail();
                let _ = msg_tx.send(Err(e)).await;
                return;
            }

            if cancel_bg.is_cancelled() {
                // Stopped early: no completion signal, state set by stop().
                return;
            }

            if shared_bg.clips.lock().unwrap().is_empty() {
                tracing::warn!("stream ended with zero decoded clips");
                shared_bg.fail();
                let _ = msg_tx.send(Err(SessionError::EmptyResult)).await;
                return;
            }

            // All frames decoded and scheduled; drain until the last clip
            // finishes playing. The download buffer is available from here on.
            if !shared_bg.begin_draining() {
                return;
            }
            shared_bg.scheduler.lock().unwrap().mark_end_of_stream();

            loop {
                let remaining = {
                    let sch = shared_bg.scheduler.lock().unwrap();
                    if sch.is_stopped() {
                        return;
                    }
                    match sch.end_time() {
                        Some(end) => end - sch.now(),
                        None => 0.0,
                    }
                };
                if remaining <= 0.0 {
                    break;
                }
                tokio::select! {
                    _ = cancel_bg.cancelled() => return,
                    _ = tokio::time::sleep(Duration::from_secs_f64(remaining.clamp(0.001, 0.05))) => {}
                }
            }

            let completed = shared_bg.scheduler.lock().unwrap().try_complete();
            if completed {
                shared_bg.set_state(SessionState::Completed);
                tracing::info!("session completed");
                let _ = msg_tx.send(Ok(SessionMsg::Completed)).await;
            }
        });

        Self {
            rx,
            cancel,
            streaming_task,
            shared,
        }
    }

    /// Stop this session: silence all scheduled audio immediately, prevent
    /// any further scheduling, and suppress the completion signal.
    ///
    /// Idempotent; stopping a finished or already-stopped session is a no-op.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.shared.scheduler.lock().unwrap().stop();
        let stopped = {
            let mut state = self.shared.state.lock().unwrap();
            if matches!(*state, SessionState::Streaming | SessionState::Draining) {
                *state = SessionState::Stopped;
                true
            } else {
                false
            }
        };
        if stopped {
            // A stopped session never offers a (partial) download.
            self.shared.clips.lock().unwrap().clear();
            tracing::info!("session stopped by user");
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Current playback progress (valid in any state; zeroes before the
    /// first clip).
    pub fn progress(&self) -> ProgressUpdate {
        self.shared.scheduler.lock().unwrap().progress()
    }

    /// Serialize everything decoded so far into one downloadable WAV.
    ///
    /// Available once the frame stream has ended (`Draining` or
    /// `Completed`); recomputed fresh on every call. Stopped and failed
    /// sessions have discarded their buffers and return an error instead of
    /// a partial file.
    pub fn finalize_wav(&self) -> SessionResult<Bytes> {
        match self.shared.state() {
            SessionState::Draining | SessionState::Completed => {
                let clips = self.shared.clips.lock().unwrap();
                encode_wav(&clips)
            }
            SessionState::Stopped => Err(SessionError::Cancelled),
            _ => Err(SessionError::NotFinished),
        }
    }

    /// Await the next ordered message (convenience wrapper around the
    /// `Stream` impl). `None` after the session terminates.
    pub async fn next_msg(&mut self) -> Option<SessionResult<SessionMsg>> {
        self.rx.recv().await
    }
}

impl Stream for StreamSession {
    type Item = SessionResult<SessionMsg>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Decode queued frame payloads strictly in order and hand them to the
/// scheduler.
///
/// Each decode runs on the blocking pool; the loop awaits it before touching
/// the next payload, so scheduler delivery order always matches frame order.
/// Ends when the frame channel closes (end of stream), when scheduling is
/// refused (session stopped), or on decode failure, which also cancels the
/// session so the streaming task does not keep waiting on the transport.
async fn decode_loop(
    mut frame_rx: mpsc::Receiver<Bytes>,
    decoder: Arc<dyn ClipDecoder>,
    shared: Arc<SessionShared>,
    msg_tx: mpsc::Sender<SessionResult<SessionMsg>>,
    cancel: CancellationToken,
) -> SessionResult<()> {
    while let Some(payload) = frame_rx.recv().await {
        if cancel.is_cancelled() {
            // Stopped with payloads still queued: discard them.
            return Ok(());
        }

        let dec = decoder.clone();
        let clip = match tokio::task::spawn_blocking(move || dec.decode(payload)).await {
            Ok(Ok(clip)) => clip,
            Ok(Err(e)) => {
                if cancel.is_cancelled() {
                    // Stopped while decoding: nothing to surface.
                    return Ok(());
                }
                // Wake the streaming task now; it must not keep waiting on
                // the transport while the session is already dead.
                cancel.cancel();
                return Err(e);
            }
            Err(e) => {
                cancel.cancel();
                return Err(SessionError::ClipDecode(format!(
                    "decode task panicked: {e}"
                )));
            }
        };

        let scheduled = shared.scheduler.lock().unwrap().schedule(&clip);
        let Some(handle) = scheduled else {
            // Decode finished after a stop: result discarded, never played.
            tracing::debug!("discarding decoded clip after stop");
            return Ok(());
        };

        shared.clips.lock().unwrap().push(clip);

        let _ = msg_tx
            .send(Ok(SessionMsg::ClipScheduled {
                index: handle.index,
                start_time: handle.start_time,
                duration: handle.duration,
            }))
            .await;
    }
    Ok(())
}

/// Drive the out-of-band progress callback while the session is live.
fn spawn_progress_ticker(
    shared: Arc<SessionShared>,
    cancel: CancellationToken,
    interval: Duration,
    cb: crate::types::ProgressCallback,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match shared.state() {
                        SessionState::Streaming | SessionState::Draining => {
                            let progress = shared.scheduler.lock().unwrap().progress();
                            cb(progress);
                        }
                        // Terminal states end the ticker.
                        _ => break,
                    }
                }
            }
        }
    });
}
