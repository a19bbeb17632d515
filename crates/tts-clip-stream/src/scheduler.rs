//! Gapless playback scheduler.
//!
//! Each decoded clip is assigned a precise start time on a monotonic clock so
//! consecutive clips play back-to-back with zero gap and zero overlap: the
//! first clip starts at `now + epsilon` (the epsilon masks decode/schedule
//! jitter), and every subsequent clip starts exactly where the previous one
//! ends, regardless of how early or late each clip finished decoding.
//!
//! Accepted limitation: if decode is slower than real time, playback start is
//! delayed until the first clip arrives, but clips already enqueued always
//! play contiguously. The scheduler never re-times a clip to paper over a
//! late decode.
//!
//! Seams:
//! - [`Clock`] abstracts the monotonic time source so timing invariants are
//!   testable with a controlled clock.
//! - [`ClipSink`] abstracts the audio output; the `rodio` feature provides a
//!   real sink, tests use recording sinks.

use std::sync::Arc;
use std::time::Instant;

use crate::types::{DecodedClip, ProgressUpdate};

/// Monotonic clock in seconds.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

/// Default [`Clock`] backed by [`Instant`].
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Audio output for scheduled clips.
///
/// `play_at` receives the precise start time computed by the scheduler.
/// Implementations that queue gaplessly by construction (e.g. an append-only
/// sink queue) may ignore it; it is authoritative for implementations that
/// schedule against a hardware clock.
pub trait ClipSink: Send + 'static {
    fn play_at(&mut self, clip: &DecodedClip, start_time: f64);

    /// Stop every scheduled-but-unfinished unit. Must be idempotent; stopping
    /// an empty or already-stopped sink is a no-op.
    fn stop_all(&mut self);
}

/// Handle describing one scheduled clip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClip {
    /// Zero-based frame sequence number.
    pub index: usize,
    pub start_time: f64,
    pub duration: f64,
}

/// Assigns gapless start times to decoded clips and tracks session timing.
pub struct PlaybackScheduler {
    clock: Arc<dyn Clock>,
    sink: Box<dyn ClipSink>,
    epsilon: f64,

    session_start: Option<f64>,
    next_start: Option<f64>,
    total_duration: f64,
    scheduled: usize,

    stopped: bool,
    eos: bool,
    completed: bool,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn Clock>, sink: Box<dyn ClipSink>, epsilon_seconds: f64) -> Self {
        Self {
            clock,
            sink,
            epsilon: epsilon_seconds,
            session_start: None,
            next_start: None,
            total_duration: 0.0,
            scheduled: 0,
            stopped: false,
            eos: false,
            completed: false,
        }
    }

    /// Schedule `clip` to start exactly where the previous clip ends.
    ///
    /// Returns `None` once the session was stopped: late decode results must
    /// be discarded, never scheduled.
    pub fn schedule(&mut self, clip: &DecodedClip) -> Option<ScheduledClip> {
        if self.stopped {
            return None;
        }

        let start = match self.next_start {
            Some(t) => t,
            None => {
                let t = self.clock.now() + self.epsilon;
                self.session_start = Some(t);
                t
            }
        };
        let duration = clip.duration_seconds();

        self.sink.play_at(clip, start);
        self.next_start = Some(start + duration);
        self.total_duration += duration;

        let index = self.scheduled;
        self.scheduled += 1;

        tracing::debug!(index, start, duration, "scheduled clip");
        Some(ScheduledClip {
            index,
            start_time: start,
            duration,
        })
    }

    /// Stop playback and refuse any further scheduling. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.sink.stop_all();
        tracing::debug!(scheduled = self.scheduled, "playback stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Record that the upstream frame stream has ended; a completion can only
    /// fire after this.
    pub fn mark_end_of_stream(&mut self) {
        self.eos = true;
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Seconds since the first clip's scheduled start (0 before that).
    pub fn elapsed(&self) -> f64 {
        match self.session_start {
            Some(start) => (self.clock.now() - start).max(0.0),
            None => 0.0,
        }
    }

    /// Sum of all scheduled clip durations so far.
    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    /// End time of the last scheduled clip, if any clip was scheduled.
    pub fn end_time(&self) -> Option<f64> {
        self.next_start
    }

    pub fn progress(&self) -> ProgressUpdate {
        ProgressUpdate {
            elapsed_seconds: self.elapsed(),
            total_duration_seconds: self.total_duration,
        }
    }

    /// Fire the completion signal if due.
    ///
    /// Returns `true` exactly once, when end-of-stream was marked, the
    /// session was not stopped, and the clock has passed the last scheduled
    /// end time. Never fires for a stopped session.
    pub fn try_complete(&mut self) -> bool {
        if self.completed || self.stopped || !self.eos {
            return false;
        }
        let Some(end) = self.next_start else {
            return false;
        };
        if self.clock.now() < end {
            return false;
        }
        self.completed = true;
        true
    }
}
