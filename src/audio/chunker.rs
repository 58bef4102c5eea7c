//! Fixed-window chunking of speech intervals
//!
//! Each speech interval is sliced into overlapping analysis windows of
//! length W advancing by `stride` (stride <= W). The final partial window is
//! right-padded with zeros so every emitted chunk has exactly
//! `W * sample_rate` samples. Padding never borrows samples from outside the
//! parent interval, so no non-speech audio leaks into a chunk.

use crate::audio::vad::SpeechInterval;
use crate::audio::AudioBuffer;
use crate::error::{DetectorError, Result};
use tracing::debug;

/// Window length and stride for chunking, in seconds
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    window_secs: f32,
    stride_secs: f32,
}

impl ChunkConfig {
    pub fn new(window_secs: f32, stride_secs: f32) -> Result<Self> {
        if !(window_secs > 0.0) || !(stride_secs > 0.0) {
            return Err(DetectorError::Config(
                "window and stride must be positive".into(),
            ));
        }
        if stride_secs > window_secs {
            return Err(DetectorError::Config(format!(
                "stride ({:.2}s) must not exceed window ({:.2}s)",
                stride_secs, window_secs
            )));
        }
        Ok(Self {
            window_secs,
            stride_secs,
        })
    }

    pub fn window_secs(&self) -> f32 {
        self.window_secs
    }

    pub fn stride_secs(&self) -> f32 {
        self.stride_secs
    }

    /// Exact chunk length in samples at the given rate
    pub fn window_samples(&self, sample_rate: u32) -> usize {
        (self.window_secs as f64 * sample_rate as f64).round() as usize
    }
}

/// A fixed-length slice of audio with its absolute position in the source
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Exactly `window * sample_rate` samples, zero-padded on the right
    pub samples: Vec<f32>,
    /// Absolute start time in seconds
    pub start: f64,
    /// Absolute end time in seconds (before padding)
    pub end: f64,
}

/// Lazy iterator over `(t0, t1)` window boundaries within one interval.
///
/// Starts at the interval start and advances by the stride while `t0 < end`;
/// every window's upper bound is clamped to the interval end. Clone to
/// restart. An interval shorter than one stride still yields exactly one
/// window.
#[derive(Debug, Clone)]
pub struct WindowIter {
    start: f64,
    end: f64,
    window: f64,
    stride: f64,
    index: usize,
}

impl WindowIter {
    pub fn new(interval: &SpeechInterval, config: &ChunkConfig) -> Self {
        Self {
            start: interval.start,
            end: interval.end,
            window: config.window_secs as f64,
            stride: config.stride_secs as f64,
            index: 0,
        }
    }
}

impl Iterator for WindowIter {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<(f64, f64)> {
        // Multiply rather than accumulate so boundaries are reproducible
        let t0 = self.start + self.index as f64 * self.stride;
        if t0 >= self.end {
            return None;
        }
        self.index += 1;
        let t1 = (t0 + self.window).min(self.end);
        Some((t0, t1))
    }
}

/// Carve one speech interval into fixed-length chunks.
pub fn chunk_interval(
    buffer: &AudioBuffer,
    interval: &SpeechInterval,
    config: &ChunkConfig,
) -> Vec<Chunk> {
    let rate = buffer.sample_rate() as f64;
    let samples = buffer.samples();
    let chunk_len = config.window_samples(buffer.sample_rate());

    let mut chunks = Vec::new();
    for (t0, t1) in WindowIter::new(interval, config) {
        let start_sample = ((t0 * rate).round() as usize).min(samples.len());
        let end_sample = ((t1 * rate).round() as usize).min(samples.len());

        let mut window = samples[start_sample..end_sample].to_vec();
        // Right-pad a short tail window; only interval samples are used
        window.resize(chunk_len, 0.0);

        chunks.push(Chunk {
            samples: window,
            start: t0,
            end: t1,
        });
    }

    debug!(
        "Chunked interval [{:.2}s, {:.2}s) into {} windows of {} samples",
        interval.start,
        interval.end,
        chunks.len(),
        chunk_len
    );
    chunks
}
