use rodio::buffer::SamplesBuffer;

use crate::scheduler::ClipSink;
use crate::types::DecodedClip;

/// Rodio adapter that plays scheduled clips through a `rodio::Sink`.
///
/// Notes:
/// - A `rodio::Sink` queues appended sources back to back with no gap, which
///   is exactly the contiguous timeline the scheduler computes. The
///   `start_time` argument is therefore informational here; ordering is what
///   matters, and clips arrive in scheduling order.
/// - Each clip is handed over as an interleaved `SamplesBuffer` captured at
///   the clip's own sample rate and channel count, so a mid-session spec
///   change plays correctly even though the final WAV normalizes to the
///   first clip's spec.
pub struct RodioClipSink {
    sink: rodio::Sink,
}

impl RodioClipSink {
    /// Wrap an existing `rodio::Sink`. The caller keeps the output stream
    /// handle alive for the duration of playback.
    pub fn new(sink: rodio::Sink) -> Self {
        Self { sink }
    }
}

impl ClipSink for RodioClipSink {
    fn play_at(&mut self, clip: &DecodedClip, start_time: f64) {
        let spec = clip.spec();
        tracing::debug!(
            start_time,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            frames = clip.frames(),
            "appending clip to rodio sink"
        );
        let buffer = SamplesBuffer::new(spec.channels, spec.sample_rate, clip.interleaved());
        self.sink.append(buffer);
    }

    fn stop_all(&mut self) {
        self.sink.stop();
    }
}
