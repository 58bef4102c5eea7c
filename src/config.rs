//! Pipeline configuration
//!
//! All tunables live in one immutable struct constructed at startup from
//! defaults, environment variables (`VOICEPROOF_*`) or CLI flags, then passed
//! by reference into each pipeline invocation. No global state.

use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Default pipeline sample rate (classifiers are trained on 16kHz audio)
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

/// How per-model aggregate scores are turned into a final label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecisionPolicy {
    /// Mean of per-model fake-scores; AI-generated if it exceeds 0.5
    #[default]
    Average,
    /// AI-generated only if a strict majority of models exceed 0.5
    Majority,
}

impl FromStr for DecisionPolicy {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "average" => Ok(DecisionPolicy::Average),
            "majority" => Ok(DecisionPolicy::Majority),
            other => Err(DetectorError::Config(format!(
                "unknown decision policy '{}' (expected 'average' or 'majority')",
                other
            ))),
        }
    }
}

/// Immutable configuration for one detector instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target sample rate the loader resamples to
    pub sample_rate: u32,
    /// Analysis window length W in seconds
    pub window_secs: f32,
    /// Advance between consecutive windows in seconds (stride <= window)
    pub stride_secs: f32,
    /// VAD frame length in milliseconds (10, 20 or 30)
    pub vad_frame_ms: u32,
    /// VAD aggressiveness, 0 (quality) to 3 (very aggressive)
    pub vad_aggressiveness: u8,
    /// Non-speech frames tolerated inside a speech run before it is split
    pub vad_max_gap_frames: usize,
    /// Chunks per classifier batch (throughput only, never affects scores)
    pub batch_size: usize,
    /// Decision policy for fusing per-model scores
    pub policy: DecisionPolicy,
    /// Model identifiers to load (subdirectories of `model_dir`)
    pub models: Vec<String>,
    /// Directory holding one subdirectory per model
    pub model_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            window_secs: 3.0,
            stride_secs: 1.5,
            vad_frame_ms: 30,
            vad_aggressiveness: 2,
            vad_max_gap_frames: 0,
            batch_size: 8,
            policy: DecisionPolicy::Average,
            models: vec!["deepfake-audio-v2".to_string()],
            model_dir: PathBuf::from("models"),
        }
    }
}

impl PipelineConfig {
    /// Build a config from defaults overridden by `VOICEPROOF_*` environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(rate) = env_parse::<u32>("VOICEPROOF_SAMPLE_RATE")? {
            config.sample_rate = rate;
        }
        if let Some(window) = env_parse::<f32>("VOICEPROOF_WINDOW_SECS")? {
            config.window_secs = window;
        }
        if let Some(stride) = env_parse::<f32>("VOICEPROOF_STRIDE_SECS")? {
            config.stride_secs = stride;
        }
        if let Some(frame_ms) = env_parse::<u32>("VOICEPROOF_VAD_FRAME_MS")? {
            config.vad_frame_ms = frame_ms;
        }
        if let Some(level) = env_parse::<u8>("VOICEPROOF_VAD_AGGRESSIVENESS")? {
            config.vad_aggressiveness = level;
        }
        if let Some(gap) = env_parse::<usize>("VOICEPROOF_VAD_MAX_GAP_FRAMES")? {
            config.vad_max_gap_frames = gap;
        }
        if let Some(batch) = env_parse::<usize>("VOICEPROOF_BATCH_SIZE")? {
            config.batch_size = batch;
        }
        if let Ok(policy) = std::env::var("VOICEPROOF_POLICY") {
            config.policy = policy.parse()?;
        }
        if let Ok(models) = std::env::var("VOICEPROOF_MODELS") {
            config.models = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        if let Ok(dir) = std::env::var("VOICEPROOF_MODEL_DIR") {
            config.model_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Check invariants once at startup so the pipeline never has to
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(DetectorError::Config("sample_rate must be positive".into()));
        }
        if !(self.window_secs > 0.0) {
            return Err(DetectorError::Config("window_secs must be positive".into()));
        }
        if !(self.stride_secs > 0.0) {
            return Err(DetectorError::Config("stride_secs must be positive".into()));
        }
        if self.stride_secs > self.window_secs {
            return Err(DetectorError::Config(format!(
                "stride ({:.2}s) must not exceed window ({:.2}s)",
                self.stride_secs, self.window_secs
            )));
        }
        if self.batch_size == 0 {
            return Err(DetectorError::Config("batch_size must be at least 1".into()));
        }
        if self.models.is_empty() {
            return Err(DetectorError::Config("at least one model must be configured".into()));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            DetectorError::Config(format!("could not parse {}='{}'", key, raw))
        }),
        Err(_) => Ok(None),
    }
}
