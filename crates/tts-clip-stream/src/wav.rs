//! PCM concatenator and WAV encoder.
//!
//! Merges the decoded clips of a session, in arrival order, into a single
//! 16-bit signed little-endian PCM buffer wrapped in a standard 44-byte
//! RIFF/WAVE container. The result is a complete, independently playable
//! file, suitable for the download feature once streaming finishes. It is
//! recomputed fresh on every call, never patched incrementally.
//!
//! Quantization rule: samples are clamped to `[-1, 1]`, scaled by 32767 and
//! truncated toward zero, so `[0.0, 1.0, -1.0, 0.5]` encodes to
//! `[0, 32767, -32767, 16383]`.

use bytes::Bytes;

use crate::error::{SessionError, SessionResult};
use crate::types::DecodedClip;

/// Fixed name for the downloadable file.
pub const DOWNLOAD_FILE_NAME: &str = "tts-audio.wav";

const HEADER_BYTES: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;
const PCM_FORMAT: u16 = 1;

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Serialize `clips` into one WAV container.
///
/// All clips of a session share a sample rate and channel count by
/// construction (same backend, same session). If that internal invariant is
/// ever violated the mismatch is logged and encoding proceeds with the first
/// clip's spec: shorter clips are zero-padded per frame, extra channels are
/// dropped. Returns [`SessionError::EmptyResult`] for an empty clip list.
pub fn encode_wav(clips: &[DecodedClip]) -> SessionResult<Bytes> {
    let first = clips.first().ok_or(SessionError::EmptyResult)?;
    let spec = first.spec();

    for (i, clip) in clips.iter().enumerate() {
        if clip.spec() != spec {
            tracing::warn!(
                clip = i,
                expected_rate = spec.sample_rate,
                expected_channels = spec.channels,
                got_rate = clip.spec().sample_rate,
                got_channels = clip.spec().channels,
                "clip spec mismatch within one session; encoding with first clip's spec"
            );
        }
    }

    let channels = spec.channels.max(1);
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let byte_rate = spec.sample_rate * block_align as u32;

    let total_frames: usize = clips.iter().map(DecodedClip::frames).sum();
    let data_bytes = total_frames * block_align as usize;

    let mut out = Vec::with_capacity(HEADER_BYTES + data_bytes);

    // RIFF chunk.
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((36 + data_bytes) as u32).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt subchunk.
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&spec.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data subchunk, clips concatenated in arrival order.
    out.extend_from_slice(b"data");
    out.extend_from_slice(&(data_bytes as u32).to_le_bytes());

    for clip in clips {
        let clip_channels = clip.channel_count();
        for f in 0..clip.frames() {
            for ch in 0..channels as usize {
                let sample = if ch < clip_channels {
                    clip.channel(ch)[f]
                } else {
                    0.0
                };
                out.extend_from_slice(&quantize(sample).to_le_bytes());
            }
        }
    }

    Ok(Bytes::from(out))
}
