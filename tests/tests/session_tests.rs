//! End-to-end session tests against a fixture synthesis server.
//!
//! These run the full pipeline: HTTP source, frame demultiplexing, Symphonia
//! decode, gapless scheduling against a recording sink, and WAV finalization.

mod session_fixture;

use axum::http::StatusCode;
use futures_util::StreamExt;
use session_fixture::{
    flush_sentinel, frame, generate_sine_wav, spawn_error_server, spawn_stalling_server,
    spawn_streaming_server, RecordingSink,
};
use std::time::Duration;

use tts_clip_stream::{
    BackendConfig, ClipByteSource, HttpClipSource, SessionError, SessionMsg, SessionOptions,
    SessionState, SourceMsg, StreamSession, SynthesisRequest,
};

const SAMPLE_RATE: u32 = 8000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

async fn start_session(
    addr: std::net::SocketAddr,
    opts: SessionOptions,
) -> (StreamSession, RecordingSink) {
    let base_url = format!("http://{addr}").parse().expect("base url");
    let backend = BackendConfig::design(base_url);
    let request = SynthesisRequest::new("fixture text").with_language("en");
    let source = Box::new(HttpClipSource::new(backend, request).expect("source"));
    let sink = RecordingSink::new();
    let session = StreamSession::start(source, Box::new(sink.clone()), opts);
    (session, sink)
}

#[tokio::test]
async fn two_clips_schedule_gapless_and_complete() {
    init_tracing();

    // 0.05s and 0.1s mono clips, with a flush sentinel between them.
    let wav1 = generate_sine_wav(440.0, 400, SAMPLE_RATE, 1);
    let wav2 = generate_sine_wav(660.0, 800, SAMPLE_RATE, 1);
    let mut body = frame(&wav1);
    body.extend_from_slice(&flush_sentinel());
    body.extend_from_slice(&frame(&wav2));

    let addr = spawn_streaming_server(body).await;
    let (mut session, sink) = start_session(addr, SessionOptions::default()).await;

    let first = session.next().await.expect("first msg").expect("ok");
    let SessionMsg::ClipScheduled {
        index: 0,
        start_time: t1,
        duration: d1,
    } = first
    else {
        panic!("expected first clip, got {first:?}");
    };
    assert!((d1 - 0.05).abs() < 1e-9);

    let second = session.next().await.expect("second msg").expect("ok");
    let SessionMsg::ClipScheduled {
        index: 1,
        start_time: t2,
        duration: d2,
    } = second
    else {
        panic!("expected second clip, got {second:?}");
    };
    assert!((d2 - 0.1).abs() < 1e-9);
    // The second clip starts exactly where the first ends.
    assert!((t2 - (t1 + d1)).abs() < 1e-9);

    let third = session.next().await.expect("completion msg").expect("ok");
    assert!(matches!(third, SessionMsg::Completed));
    assert!(session.next().await.is_none());

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(
        sink.played()
            .iter()
            .map(|&(_, frames)| frames)
            .collect::<Vec<_>>(),
        vec![400, 800]
    );

    // 16-bit mono concatenation of both clips behind a 44-byte header.
    let wav = session.finalize_wav().expect("finalized wav");
    assert_eq!(wav.len(), 44 + (400 + 800) * 2);
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
}

#[tokio::test]
async fn progress_callback_reports_monotonic_fraction() {
    init_tracing();

    let wav = generate_sine_wav(440.0, 800, SAMPLE_RATE, 1);
    let addr = spawn_streaming_server(frame(&wav)).await;

    let updates = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink_updates = updates.clone();
    let opts = SessionOptions::default().with_progress_callback(std::sync::Arc::new(
        move |update| {
            sink_updates.lock().unwrap().push(update);
        },
    ));

    let (mut session, _sink) = start_session(addr, opts).await;
    while session.next().await.is_some() {}

    let updates = updates.lock().unwrap();
    assert!(!updates.is_empty(), "expected at least one progress tick");
    for pair in updates.windows(2) {
        assert!(pair[1].elapsed_seconds >= pair[0].elapsed_seconds);
    }
    for update in updates.iter() {
        let f = update.fraction();
        assert!((0.0..=1.0).contains(&f));
    }
}

#[tokio::test]
async fn source_stream_drains_to_none_after_end_of_stream() {
    init_tracing();

    let wav = generate_sine_wav(440.0, 400, SAMPLE_RATE, 1);
    let addr = spawn_streaming_server(frame(&wav)).await;

    let base_url = format!("http://{addr}").parse().expect("base url");
    let backend = BackendConfig::design(base_url);
    let source = Box::new(
        HttpClipSource::new(backend, SynthesisRequest::new("fixture text")).expect("source"),
    );

    // Drain the raw source stream all the way, past EndOfStream.
    let mut stream = ClipByteSource::into_stream(source);
    let mut data_bytes = 0usize;
    let mut saw_end = false;
    while let Some(item) = stream.next().await {
        match item.expect("source item") {
            SourceMsg::Data(chunk) => data_bytes += chunk.len(),
            SourceMsg::EndOfStream => saw_end = true,
        }
    }
    assert!(saw_end);
    assert_eq!(data_bytes, 4 + wav.len());

    // Exhausted stream stays terminal when polled again.
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn decode_failure_surfaces_while_source_stalls() {
    init_tracing();

    // A complete frame whose payload is not audio, from a server that then
    // keeps the connection open as if more clips were coming.
    let addr = spawn_stalling_server(frame(b"definitely not a wav payload")).await;
    let (mut session, sink) = start_session(addr, SessionOptions::default()).await;

    let msg = tokio::time::timeout(Duration::from_secs(5), session.next())
        .await
        .expect("error must surface while the transport is still open")
        .expect("error msg");
    assert!(matches!(msg, Err(SessionError::ClipDecode(_))));
    assert!(session.next().await.is_none());

    assert_eq!(session.state(), SessionState::Failed);
    assert!(sink.played().is_empty());
    assert!(sink.stop_calls() >= 1);
    assert!(session.finalize_wav().is_err());
}

#[tokio::test]
async fn stop_while_draining_withholds_the_download() {
    init_tracing();

    // Single clip; the body ends immediately, so by the time the clip is
    // scheduled the session is at or past the drain transition.
    let wav = generate_sine_wav(440.0, 800, SAMPLE_RATE, 1);
    let addr = spawn_streaming_server(frame(&wav)).await;
    let (mut session, _sink) = start_session(addr, SessionOptions::default()).await;

    let first = session.next().await.expect("first msg").expect("ok");
    assert!(matches!(first, SessionMsg::ClipScheduled { index: 0, .. }));

    session.stop();

    // Completion is suppressed and the buffer is gone, whether the stop
    // landed just before or just after the drain transition.
    assert!(session.next().await.is_none());
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(matches!(
        session.finalize_wav(),
        Err(SessionError::Cancelled)
    ));
}

#[tokio::test]
async fn stop_mid_stream_discards_everything() {
    init_tracing();

    // Two complete frames arrive, then the server stalls as if more clips
    // were still being synthesized.
    let wav1 = generate_sine_wav(440.0, 400, SAMPLE_RATE, 1);
    let wav2 = generate_sine_wav(660.0, 400, SAMPLE_RATE, 1);
    let mut first_chunk = frame(&wav1);
    first_chunk.extend_from_slice(&frame(&wav2));

    let addr = spawn_stalling_server(first_chunk).await;
    let (mut session, sink) = start_session(addr, SessionOptions::default()).await;

    let first = session.next().await.expect("first msg").expect("ok");
    assert!(matches!(first, SessionMsg::ClipScheduled { index: 0, .. }));
    let second = session.next().await.expect("second msg").expect("ok");
    assert!(matches!(second, SessionMsg::ClipScheduled { index: 1, .. }));

    session.stop();
    // Second stop is a no-op.
    session.stop();

    // No completion, no further clips; the channel just closes.
    assert!(session.next().await.is_none());
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(sink.stop_calls() >= 1);
    assert_eq!(sink.played().len(), 2);
    assert!(matches!(
        session.finalize_wav(),
        Err(SessionError::Cancelled)
    ));
}

#[tokio::test]
async fn stream_with_zero_clips_is_an_empty_result() {
    init_tracing();

    let addr = spawn_streaming_server(flush_sentinel()).await;
    let (mut session, sink) = start_session(addr, SessionOptions::default()).await;

    let msg = session.next().await.expect("error msg");
    assert!(matches!(msg, Err(SessionError::EmptyResult)));
    assert!(session.next().await.is_none());
    assert_eq!(session.state(), SessionState::Failed);
    assert!(sink.played().is_empty());
}

#[tokio::test]
async fn http_error_status_fails_the_session() {
    init_tracing();

    let addr = spawn_error_server(StatusCode::INTERNAL_SERVER_ERROR).await;
    let (mut session, _sink) = start_session(addr, SessionOptions::default()).await;

    let msg = session.next().await.expect("error msg");
    assert!(matches!(msg, Err(SessionError::StreamCorruption(_))));
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.finalize_wav().is_err());
}

#[tokio::test]
async fn oversized_length_prefix_is_corruption() {
    init_tracing();

    let addr = spawn_streaming_server(vec![0xFF, 0xFF, 0xFF, 0xFF]).await;
    let (mut session, _sink) = start_session(addr, SessionOptions::default()).await;

    let msg = session.next().await.expect("error msg");
    assert!(matches!(msg, Err(SessionError::StreamCorruption(_))));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn truncated_trailing_frame_discards_earlier_clips() {
    init_tracing();

    let wav = generate_sine_wav(440.0, 400, SAMPLE_RATE, 1);
    let mut body = frame(&wav);
    // Incomplete length prefix left dangling when the stream closes.
    body.extend_from_slice(&[0x05, 0x00, 0x00]);

    let addr = spawn_streaming_server(body).await;
    let (mut session, sink) = start_session(addr, SessionOptions::default()).await;

    // The complete first clip still gets scheduled before the cut is seen.
    let first = session.next().await.expect("first msg").expect("ok");
    assert!(matches!(first, SessionMsg::ClipScheduled { index: 0, .. }));
    assert_eq!(sink.played().len(), 1);

    let msg = session.next().await.expect("error msg");
    assert!(matches!(msg, Err(SessionError::StreamCorruption(_))));
    assert!(session.next().await.is_none());
    assert_eq!(session.state(), SessionState::Failed);
    // Partial output is never offered for download.
    assert!(session.finalize_wav().is_err());
    assert!(sink.stop_calls() >= 1);
}
