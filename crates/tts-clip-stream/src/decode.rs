//! Clip decoder adapter.
//!
//! Each complete frame payload is a self-contained WAV container. The session
//! treats decoding as a black box behind [`ClipDecoder`]; the default
//! implementation is Symphonia-backed.
//!
//! The trait is blocking by design: the session invokes it through
//! `tokio::task::spawn_blocking`, so a slow decode suspends the session
//! without stalling the async runtime. Decode failure is fatal to the session
//! (skipping a clip would break the gapless-timing invariant downstream).

use std::io::Cursor;

use bytes::Bytes;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::{SessionError, SessionResult};
use crate::types::{AudioSpec, DecodedClip};

/// Decodes one complete audio container into PCM.
///
/// Implementations must be deterministic per input and must not retain any
/// cross-clip state; every frame payload is decoded independently.
pub trait ClipDecoder: Send + Sync + 'static {
    fn decode(&self, bytes: Bytes) -> SessionResult<DecodedClip>;
}

/// Symphonia-backed [`ClipDecoder`] for complete in-memory WAV buffers.
#[derive(Debug, Default)]
pub struct SymphoniaClipDecoder;

impl SymphoniaClipDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ClipDecoder for SymphoniaClipDecoder {
    fn decode(&self, bytes: Bytes) -> SessionResult<DecodedClip> {
        let mss = MediaSourceStream::new(
            Box::new(Cursor::new(bytes)),
            MediaSourceStreamOptions::default(),
        );

        let mut hint = Hint::new();
        hint.with_extension("wav");

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SessionError::ClipDecode(format!("probe: {e}")))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SessionError::ClipDecode("no audio track".into()))?;
        let track_id = track.id;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SessionError::ClipDecode(format!("make decoder: {e}")))?;

        // Seed the spec from the probed parameters so an (unusual but legal)
        // zero-sample clip still carries a valid format.
        let mut spec: Option<AudioSpec> = match (
            track.codec_params.sample_rate,
            track.codec_params.channels,
        ) {
            (Some(rate), Some(ch)) => Some(AudioSpec {
                sample_rate: rate,
                channels: ch.count() as u16,
            }),
            _ => None,
        };

        let mut planar: Vec<Vec<f32>> = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(SessionError::ClipDecode(format!("next_packet: {e}"))),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| SessionError::ClipDecode(format!("decode: {e}")))?;

            let sig = *decoded.spec();
            let packet_spec = AudioSpec {
                sample_rate: sig.rate,
                channels: sig.channels.count() as u16,
            };
            match spec {
                None => spec = Some(packet_spec),
                Some(s) if s != packet_spec => {
                    return Err(SessionError::ClipDecode(
                        "audio spec changed mid-clip".into(),
                    ));
                }
                Some(_) => {}
            }

            let n_ch = packet_spec.channels.max(1) as usize;
            if planar.len() < n_ch {
                planar.resize_with(n_ch, Vec::new);
            }

            let needed = decoded.capacity() as u64;
            let recreate = sample_buf
                .as_ref()
                .map_or(true, |b| b.capacity() < decoded.capacity() * n_ch);
            if recreate {
                sample_buf = Some(SampleBuffer::<f32>::new(needed, sig));
            }
            let buf = sample_buf.as_mut().expect("sample buffer present");
            buf.copy_interleaved_ref(decoded);

            for frame in buf.samples().chunks_exact(n_ch) {
                for (ch, &s) in frame.iter().enumerate() {
                    planar[ch].push(s);
                }
            }
        }

        let spec =
            spec.ok_or_else(|| SessionError::ClipDecode("no audio data in clip".into()))?;
        if planar.is_empty() {
            planar = vec![Vec::new(); spec.channels.max(1) as usize];
        }

        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            frames = planar.first().map_or(0, |c| c.len()),
            "decoded clip"
        );

        Ok(DecodedClip::new(spec, planar))
    }
}
