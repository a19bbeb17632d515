//! Public, minimal types for the clip-streaming API.
//!
//! This module intentionally keeps the surface area small and focused on:
//! - ordered consumption ([`SessionMsg`]),
//! - immutable decoded audio ([`DecodedClip`]),
//! - explicit, meaningful buffering/timing configuration ([`SessionOptions`]).

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Basic PCM specification for decoded clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One decoded unit of PCM audio corresponding to one frame's payload.
///
/// Samples are stored planar: one `Vec<f32>` per channel, all of equal length.
/// A clip is immutable once produced; the playback scheduler and the WAV
/// concatenator both hold it read-only.
#[derive(Debug, Clone)]
pub struct DecodedClip {
    spec: AudioSpec,
    channels: Vec<Vec<f32>>,
}

impl DecodedClip {
    /// Build a clip from planar channel data.
    ///
    /// All channel vectors must have the same length; `spec.channels` must
    /// match `channels.len()`.
    pub fn new(spec: AudioSpec, channels: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(spec.channels as usize, channels.len());
        debug_assert!(channels.windows(2).all(|w| w[0].len() == w[1].len()));
        Self { spec, channels }
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples for a single channel. Panics if `index` is out of range.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Number of sample-frames (one sample per channel at a single instant).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    /// Playback duration of this clip at its native sample rate.
    pub fn duration_seconds(&self) -> f64 {
        if self.spec.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.spec.sample_rate as f64
    }

    /// Interleave the planar channels (`L R L R ...` for stereo).
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for f in 0..frames {
            for ch in &self.channels {
                out.push(ch[f]);
            }
        }
        out
    }
}

/// Snapshot of playback progress while a session is streaming or draining.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Seconds elapsed since the first clip's scheduled start.
    pub elapsed_seconds: f64,
    /// Sum of the durations of all clips scheduled so far.
    pub total_duration_seconds: f64,
}

impl ProgressUpdate {
    /// Fractional progress, clamped to `[0, 1]`.
    ///
    /// The total keeps growing while clips are still arriving, so the
    /// fraction can move non-monotonically; it never leaves `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total_duration_seconds <= 0.0 {
            return 0.0;
        }
        (self.elapsed_seconds / self.total_duration_seconds).clamp(0.0, 1.0)
    }
}

/// Out-of-band progress callback, invoked at a fixed cadence while streaming.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Session lifecycle states.
///
/// A session is born `Streaming`; transitions are driven by discrete events:
/// `Streaming -> Draining` when the frame stream ends with at least one clip,
/// `Draining -> Completed` when the last scheduled clip finishes playing,
/// `* -> Stopped` on user stop, `* -> Failed` on any fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Streaming,
    Draining,
    Completed,
    Stopped,
    Failed,
}

/// Ordered stream message emitted by [`crate::StreamSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionMsg {
    /// A decoded clip was handed to the playback scheduler.
    ///
    /// Clips are scheduled strictly in frame order; `index` is the zero-based
    /// frame sequence number.
    ClipScheduled {
        index: usize,
        start_time: f64,
        duration: f64,
    },

    /// The last scheduled clip finished playing.
    ///
    /// Emitted exactly once, and only when the upstream frame stream signaled
    /// end-of-stream and the session was not stopped early.
    Completed,
}

/// Configuration for a streaming session.
///
/// Capacities are expressed in meaningful units to avoid mysterious fixed
/// buffer sizes:
/// - bytes per frame payload (`max_frame_bytes`),
/// - framed payloads queued ahead of the decoder (`frame_queue_capacity`).
#[derive(Clone)]
pub struct SessionOptions {
    /// Upper bound on a single frame payload.
    ///
    /// A length prefix above this bound is treated as stream corruption and
    /// aborts the session.
    pub max_frame_bytes: NonZeroUsize,

    /// How many complete frame payloads may queue up while an earlier clip is
    /// still decoding. Framing continues while a decode is in flight; this
    /// bound provides upstream backpressure.
    pub frame_queue_capacity: NonZeroUsize,

    /// Offset added to the clock when scheduling the first clip of a session.
    ///
    /// Absorbs decode/schedule overhead so the very first clip does not
    /// underrun.
    pub schedule_epsilon: Duration,

    /// Cadence of the out-of-band progress callback.
    pub progress_interval: Duration,

    /// Optional progress callback, driven while the session is streaming or
    /// draining.
    pub on_progress: Option<ProgressCallback>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            // 64 MiB: far above any sane sub-clip, small enough to catch a
            // corrupt length prefix immediately.
            max_frame_bytes: NonZeroUsize::new(64 * 1024 * 1024).unwrap(),
            frame_queue_capacity: NonZeroUsize::new(16).unwrap(),
            schedule_epsilon: Duration::from_millis(50),
            // Animation-frame cadence.
            progress_interval: Duration::from_millis(16),
            on_progress: None,
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame_bytes(mut self, max: NonZeroUsize) -> Self {
        self.max_frame_bytes = max;
        self
    }

    pub fn with_frame_queue_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.frame_queue_capacity = capacity;
        self
    }

    pub fn with_schedule_epsilon(mut self, epsilon: Duration) -> Self {
        self.schedule_epsilon = epsilon;
        self
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.on_progress = Some(cb);
        self
    }
}
