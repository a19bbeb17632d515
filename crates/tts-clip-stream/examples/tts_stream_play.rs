use std::error::Error;

use futures_util::StreamExt;
use rodio::{OutputStreamBuilder, Sink};
use tts_clip_stream::{
    BackendConfig, HttpClipSource, RodioClipSink, SessionMsg, SessionOptions, StreamSession,
    SynthesisRequest, DOWNLOAD_FILE_NAME,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::default()
                .add_directive("tts_clip_stream=info".parse()?)
                .add_directive(LevelFilter::INFO.into()),
        )
        .with_line_number(true)
        .with_file(true)
        .init();

    let base_url = std::env::var("TTS_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8000".to_string())
        .parse()?;
    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello from the streaming synthesizer.".to_string());

    let backend = BackendConfig::design(base_url);
    let request = SynthesisRequest::new(text).with_language("en");
    let source = Box::new(HttpClipSource::new(backend, request)?);

    // Setup rodio output
    let stream_handle =
        OutputStreamBuilder::open_default_stream().expect("open default audio stream");
    let sink = Sink::connect_new(stream_handle.mixer());

    let mut session = StreamSession::start(
        source,
        Box::new(RodioClipSink::new(sink)),
        SessionOptions::default(),
    );

    while let Some(msg) = session.next().await {
        match msg? {
            SessionMsg::ClipScheduled {
                index,
                start_time,
                duration,
            } => {
                tracing::info!(index, start_time, duration, "clip scheduled");
            }
            SessionMsg::Completed => {
                tracing::info!("playback complete");
            }
        }
    }

    // Save the concatenated result next to the working directory.
    let wav = session.finalize_wav()?;
    std::fs::write(DOWNLOAD_FILE_NAME, &wav)?;
    tracing::info!(bytes = wav.len(), file = DOWNLOAD_FILE_NAME, "wrote download");

    Ok(())
}
