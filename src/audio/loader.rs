use crate::error::{DetectorError, Result};
use rubato::{FftFixedInOut, Resampler};
use std::io::Cursor;
use std::path::Path;
use tracing::info;

/// Divisor floor for peak normalization so silent buffers never divide by zero
const PEAK_EPSILON: f32 = 1e-6;

/// Mono audio at a fixed sample rate, peak-normalized to <= 1.0.
///
/// Immutable once constructed; owned by a single pipeline invocation and
/// discarded when it completes.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap raw mono samples, normalizing by the peak absolute amplitude.
    pub fn from_samples(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        let peak = samples.iter().fold(0.0f32, |max, s| max.max(s.abs()));
        let divisor = peak.max(PEAK_EPSILON);
        if (divisor - 1.0).abs() > f32::EPSILON {
            for sample in &mut samples {
                *sample /= divisor;
            }
        }
        Self { samples, sample_rate }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Load an audio file and convert it to a normalized mono buffer at
/// `target_rate`.
pub fn load_audio(path: &Path, target_rate: u32) -> Result<AudioBuffer> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" => {
            let reader = hound::WavReader::open(path)
                .map_err(|e| DetectorError::UnreadableAudio(e.to_string()))?;
            decode_wav(reader, target_rate)
        }
        "mp3" | "m4a" | "ogg" | "flac" | "aac" => Err(DetectorError::UnreadableAudio(format!(
            "format {} not supported natively, convert to WAV first",
            extension
        ))),
        _ => Err(DetectorError::UnreadableAudio(format!(
            "unknown audio format: {:?}",
            path
        ))),
    }
}

/// Decode an in-memory WAV byte stream (uploaded audio) to a buffer at
/// `target_rate`.
pub fn load_audio_bytes(bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DetectorError::UnreadableAudio(e.to_string()))?;
    decode_wav(reader, target_rate)
}

fn decode_wav<R: std::io::Read>(reader: hound::WavReader<R>, target_rate: u32) -> Result<AudioBuffer> {
    let spec = reader.spec();
    let source_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    info!(
        "Decoding WAV: {}Hz, {} channels, {:?}",
        source_rate, channels, spec.sample_format
    );

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| DetectorError::UnreadableAudio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| DetectorError::UnreadableAudio(e.to_string()))?
        }
    };

    if samples.is_empty() {
        return Err(DetectorError::UnreadableAudio("empty audio stream".to_string()));
    }

    // Mix to mono by averaging channels
    let mono: Vec<f32> = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    let resampled = resample(&mono, source_rate, target_rate)?;
    Ok(AudioBuffer::from_samples(resampled, target_rate))
}

/// Resample mono audio from `source_rate` to `target_rate`
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if source_rate == target_rate {
        return Ok(samples.to_vec());
    }

    info!("Resampling from {}Hz to {}Hz", source_rate, target_rate);

    let mut resampler =
        FftFixedInOut::<f32>::new(source_rate as usize, target_rate as usize, 1024, 1)
            .map_err(|e| DetectorError::UnreadableAudio(format!("failed to create resampler: {}", e)))?;

    let chunk_size = resampler.input_frames_next();
    let mut output = Vec::new();

    for chunk in samples.chunks(chunk_size) {
        let mut input_chunk = chunk.to_vec();

        // Pad last chunk if needed
        if input_chunk.len() < chunk_size {
            input_chunk.resize(chunk_size, 0.0);
        }

        let result = resampler
            .process(&[input_chunk], None)
            .map_err(|e| DetectorError::UnreadableAudio(format!("resampling failed: {}", e)))?;

        if !result.is_empty() {
            output.extend(&result[0]);
        }
    }

    Ok(output)
}
