//! Voice activity segmentation
//!
//! Partitions a buffer into speech runs so the classifier ensemble never
//! burns capacity on silence. Two interchangeable strategies sit behind the
//! `SpeechSegmenter` trait: a WebRTC-style frame classifier (`FrameVad`) and
//! a simple RMS-energy detector (`EnergyVad`).

use crate::audio::AudioBuffer;
use crate::error::{DetectorError, Result};
use earshot::{VoiceActivityDetector, VoiceActivityProfile};
use tracing::debug;

/// A speech region `[start, end)` in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechInterval {
    pub start: f64,
    pub end: f64,
}

impl SpeechInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Contract for speech segmentation strategies.
///
/// Output intervals are ordered by start time, non-overlapping, and each
/// satisfies `end > start`. An empty result means the caller should treat
/// the input as containing no speech. Implementations must be deterministic:
/// the same buffer always yields the same boundaries.
pub trait SpeechSegmenter {
    fn segments(&mut self, buffer: &AudioBuffer) -> Result<Vec<SpeechInterval>>;
}

/// Configuration for the frame-level detector
#[derive(Debug, Clone)]
pub struct FrameVadConfig {
    /// Frame length in milliseconds (10, 20 or 30)
    pub frame_ms: u32,
    /// Aggressiveness 0 (quality) to 3 (very aggressive)
    pub aggressiveness: u8,
    /// Non-speech frames tolerated inside a speech run before it is split.
    /// 0 means a single missed frame already separates two runs.
    pub max_gap_frames: usize,
}

impl Default for FrameVadConfig {
    fn default() -> Self {
        Self {
            frame_ms: 30,
            aggressiveness: 2,
            max_gap_frames: 0,
        }
    }
}

/// Frame-level voice activity detector backed by `earshot`.
///
/// Classifies fixed-length frames as speech or non-speech, then merges
/// contiguous speech frames into runs, tolerating up to `max_gap_frames`
/// missed frames inside a run.
pub struct FrameVad {
    detector: VoiceActivityDetector,
    config: FrameVadConfig,
    scratch: Vec<i16>,
}

impl FrameVad {
    pub fn new(config: FrameVadConfig) -> Result<Self> {
        if !matches!(config.frame_ms, 10 | 20 | 30) {
            return Err(DetectorError::Config(format!(
                "VAD frame length must be 10, 20 or 30 ms, got {}",
                config.frame_ms
            )));
        }
        let profile = match config.aggressiveness {
            0 => VoiceActivityProfile::QUALITY,
            1 => VoiceActivityProfile::LBR,
            2 => VoiceActivityProfile::AGGRESSIVE,
            3 => VoiceActivityProfile::VERY_AGGRESSIVE,
            other => {
                return Err(DetectorError::Config(format!(
                    "VAD aggressiveness must be 0-3, got {}",
                    other
                )))
            }
        };
        Ok(Self {
            detector: VoiceActivityDetector::new(profile),
            config,
            scratch: Vec::new(),
        })
    }
}

impl SpeechSegmenter for FrameVad {
    fn segments(&mut self, buffer: &AudioBuffer) -> Result<Vec<SpeechInterval>> {
        let rate = buffer.sample_rate();
        if !matches!(rate, 8000 | 16000 | 32000 | 48000) {
            return Err(DetectorError::Config(format!(
                "frame VAD supports 8, 16, 32 or 48kHz audio, got {}Hz",
                rate
            )));
        }

        // Fresh detector state so identical buffers yield identical runs
        self.detector.reset();

        let frame_samples = (rate as usize * self.config.frame_ms as usize) / 1000;
        let frame_secs = self.config.frame_ms as f64 / 1000.0;
        let samples = buffer.samples();

        let mut flags = Vec::with_capacity(samples.len() / frame_samples + 1);
        let mut pos = 0;
        while pos + frame_samples <= samples.len() {
            let frame = &samples[pos..pos + frame_samples];
            self.scratch.clear();
            self.scratch.extend(frame.iter().map(|s| {
                let clamped = s.clamp(-1.0, 1.0);
                (clamped * 32_767.0) as i16
            }));

            let prediction = match rate {
                8000 => self.detector.predict_8khz(&self.scratch),
                16000 => self.detector.predict_16khz(&self.scratch),
                32000 => self.detector.predict_32khz(&self.scratch),
                _ => self.detector.predict_48khz(&self.scratch),
            };
            let is_speech = match prediction {
                Ok(flag) => flag,
                Err(_) => {
                    return Err(DetectorError::Config(format!(
                        "voice activity detector rejected a {} sample frame",
                        self.scratch.len()
                    )))
                }
            };
            flags.push(is_speech);
            pos += frame_samples;
        }

        let intervals = merge_frame_flags(&flags, frame_secs, self.config.max_gap_frames);
        debug!(
            "Frame VAD: {} frames, {} speech intervals",
            flags.len(),
            intervals.len()
        );
        Ok(intervals)
    }
}

/// Merge per-frame speech decisions into intervals.
///
/// Runs separated by at most `max_gap` non-speech frames are joined. A run
/// always ends at its last speech frame: trailing gap frames are never
/// included in the interval.
fn merge_frame_flags(flags: &[bool], frame_secs: f64, max_gap: usize) -> Vec<SpeechInterval> {
    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut last_speech = 0usize;

    for (i, &is_speech) in flags.iter().enumerate() {
        if is_speech {
            if run_start.is_none() {
                run_start = Some(i);
            }
            last_speech = i;
        } else if let Some(start) = run_start {
            if i - last_speech > max_gap {
                intervals.push(SpeechInterval {
                    start: start as f64 * frame_secs,
                    end: (last_speech + 1) as f64 * frame_secs,
                });
                run_start = None;
            }
        }
    }

    if let Some(start) = run_start {
        intervals.push(SpeechInterval {
            start: start as f64 * frame_secs,
            end: (last_speech + 1) as f64 * frame_secs,
        });
    }

    intervals
}

/// Configuration for the RMS-energy detector
#[derive(Debug, Clone)]
pub struct EnergyVadConfig {
    /// Window length in seconds for energy calculation
    pub window_secs: f32,
    /// Step between windows in seconds
    pub step_secs: f32,
    /// RMS threshold below which a window counts as silence
    pub silence_threshold: f32,
}

impl Default for EnergyVadConfig {
    fn default() -> Self {
        Self {
            window_secs: 0.1,
            step_secs: 0.05,
            silence_threshold: 0.01,
        }
    }
}

/// Energy-based segmenter: marks sliding windows as speech when their RMS
/// exceeds a threshold and reports contiguous speech runs directly as
/// timestamped intervals.
pub struct EnergyVad {
    config: EnergyVadConfig,
}

impl EnergyVad {
    pub fn new(config: EnergyVadConfig) -> Self {
        Self { config }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(EnergyVadConfig::default())
    }
}

impl SpeechSegmenter for EnergyVad {
    fn segments(&mut self, buffer: &AudioBuffer) -> Result<Vec<SpeechInterval>> {
        let rate = buffer.sample_rate() as f64;
        let window_samples = (self.config.window_secs as f64 * rate) as usize;
        let step_samples = (self.config.step_secs as f64 * rate) as usize;
        if window_samples == 0 || step_samples == 0 {
            return Err(DetectorError::Config(
                "energy VAD window and step must be positive".into(),
            ));
        }

        let samples = buffer.samples();
        let mut intervals = Vec::new();
        let mut run_start: Option<usize> = None;
        let mut run_end = 0usize;
        let mut prev_end = 0usize;

        let mut pos = 0;
        while pos + window_samples <= samples.len() {
            let rms = compute_rms(&samples[pos..pos + window_samples]);
            if rms >= self.config.silence_threshold {
                if run_start.is_none() {
                    // step < window lets analysis windows overlap; a new run
                    // must not start inside the previous interval
                    run_start = Some(pos.max(prev_end));
                }
                run_end = pos + window_samples;
            } else if let Some(start) = run_start {
                intervals.push(SpeechInterval {
                    start: start as f64 / rate,
                    end: run_end as f64 / rate,
                });
                prev_end = run_end;
                run_start = None;
            }
            pos += step_samples;
        }

        if let Some(start) = run_start {
            intervals.push(SpeechInterval {
                start: start as f64 / rate,
                end: run_end as f64 / rate,
            });
        }

        debug!("Energy VAD: {} speech intervals", intervals.len());
        Ok(intervals)
    }
}

/// Compute RMS (Root Mean Square) energy of audio samples
fn compute_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with_speech_gap() -> AudioBuffer {
        // 1s loud, 0.5s silence, 1s loud
        let mut samples = vec![0.5f32; 16000];
        samples.extend(vec![0.0f32; 8000]);
        samples.extend(vec![0.5f32; 16000]);
        AudioBuffer::from_samples(samples, 16000)
    }

    #[test]
    fn energy_vad_finds_two_runs() {
        let buffer = buffer_with_speech_gap();
        let mut vad = EnergyVad::default();
        let intervals = vad.segments(&buffer).unwrap();

        assert_eq!(intervals.len(), 2);
        assert!(intervals[0].start < 0.1);
        assert!((intervals[0].end - 1.0).abs() < 0.15);
        assert!((intervals[1].start - 1.5).abs() < 0.15);
    }

    #[test]
    fn energy_vad_silence_yields_nothing() {
        let buffer = AudioBuffer::from_samples(vec![0.0f32; 32000], 16000);
        let mut vad = EnergyVad::default();
        assert!(vad.segments(&buffer).unwrap().is_empty());
    }

    #[test]
    fn energy_vad_is_deterministic() {
        let buffer = buffer_with_speech_gap();
        let mut vad = EnergyVad::default();
        let first = vad.segments(&buffer).unwrap();
        let second = vad.segments(&buffer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn intervals_are_ordered_and_disjoint() {
        let buffer = buffer_with_speech_gap();
        let mut vad = EnergyVad::default();
        let intervals = vad.segments(&buffer).unwrap();
        for pair in intervals.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for interval in &intervals {
            assert!(interval.end > interval.start);
        }
    }

    #[test]
    fn narrow_step_keeps_intervals_disjoint() {
        // window 0.3s over a 0.1s step: windows overlap, so a run closed at
        // its last speech window's end reaches past later window starts
        let mut samples = vec![1.0f32; 1600]; // loud [0.0, 0.1)
        samples.extend(vec![0.0f32; 4800]); // silence [0.1, 0.4)
        samples.extend(vec![1.0f32; 9600]); // loud [0.4, 1.0)
        let buffer = AudioBuffer::from_samples(samples, 16000);

        let mut vad = EnergyVad::new(EnergyVadConfig {
            window_secs: 0.3,
            step_secs: 0.1,
            silence_threshold: 0.01,
        });
        let intervals = vad.segments(&buffer).unwrap();

        assert_eq!(intervals.len(), 2);
        for pair in intervals.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        // The second run would start at 0.2s unclamped; it must begin where
        // the first interval ends
        assert!((intervals[0].end - 0.3).abs() < 1e-9);
        assert!((intervals[1].start - 0.3).abs() < 1e-9);
        assert!((intervals[1].end - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_gap_tolerance_keeps_runs_apart() {
        let flags = [true, true, false, true, true];
        let intervals = merge_frame_flags(&flags, 0.03, 0);
        assert_eq!(intervals.len(), 2);
        assert!((intervals[0].end - 0.06).abs() < 1e-9);
        assert!((intervals[1].start - 0.09).abs() < 1e-9);
    }

    #[test]
    fn gap_tolerance_merges_runs() {
        let flags = [true, true, false, true, true];
        let intervals = merge_frame_flags(&flags, 0.03, 1);
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].start - 0.0).abs() < 1e-9);
        assert!((intervals[0].end - 0.15).abs() < 1e-9);
    }

    #[test]
    fn trailing_gap_frames_are_not_included() {
        let flags = [true, true, false, false];
        let intervals = merge_frame_flags(&flags, 0.03, 5);
        assert_eq!(intervals.len(), 1);
        assert!((intervals[0].end - 0.06).abs() < 1e-9);
    }

    #[test]
    fn frame_vad_rejects_bad_config() {
        assert!(FrameVad::new(FrameVadConfig {
            frame_ms: 25,
            ..Default::default()
        })
        .is_err());
        assert!(FrameVad::new(FrameVadConfig {
            aggressiveness: 4,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn frame_vad_rejects_unsupported_rate() {
        let buffer = AudioBuffer::from_samples(vec![0.0f32; 44100], 44100);
        let mut vad = FrameVad::new(FrameVadConfig::default()).unwrap();
        assert!(vad.segments(&buffer).is_err());
    }

    #[test]
    fn frame_vad_handles_8khz() {
        let samples: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.3).sin() * 0.8).collect();
        let buffer = AudioBuffer::from_samples(samples, 8000);
        let mut vad = FrameVad::new(FrameVadConfig::default()).unwrap();
        let first = vad.segments(&buffer).unwrap();
        let second = vad.segments(&buffer).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn frame_vad_is_deterministic() {
        // Content does not matter, only that two passes agree exactly
        let samples: Vec<f32> = (0..32000).map(|i| (i as f32 * 0.3).sin() * 0.8).collect();
        let buffer = AudioBuffer::from_samples(samples, 16000);
        let mut vad = FrameVad::new(FrameVadConfig::default()).unwrap();
        let first = vad.segments(&buffer).unwrap();
        let second = vad.segments(&buffer).unwrap();
        assert_eq!(first, second);
    }
}
