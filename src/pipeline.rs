//! Pipeline orchestration
//!
//! One invocation runs sequentially: load -> segment -> chunk -> classify ->
//! fuse. Invocations are independent and stateless across calls; the buffer
//! and chunks are owned by the invocation and dropped on completion.

use crate::audio::{
    chunk_interval, load_audio, AudioBuffer, Chunk, ChunkConfig, FrameVad, FrameVadConfig,
    SpeechSegmenter,
};
use crate::classifier::{ClassifierRegistry, OnnxClassifier};
use crate::config::PipelineConfig;
use crate::error::{DetectorError, Result};
use crate::fusion::{fuse, Verdict};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Audio deepfake detector: the pipeline entry point.
pub struct Detector {
    config: PipelineConfig,
    segmenter: Box<dyn SpeechSegmenter>,
    registry: ClassifierRegistry,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Detector {
    /// Assemble a detector from pre-built parts.
    pub fn new(
        config: PipelineConfig,
        segmenter: Box<dyn SpeechSegmenter>,
        registry: ClassifierRegistry,
    ) -> Result<Self> {
        config.validate()?;
        if registry.is_empty() {
            return Err(DetectorError::Config(
                "detector needs at least one registered classifier".into(),
            ));
        }
        Ok(Self {
            config,
            segmenter,
            registry,
        })
    }

    /// Build the standard detector: frame VAD plus one ONNX classifier per
    /// configured model id, loaded from `<model_dir>/<model_id>/`.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;

        // The frame VAD only understands WebRTC rates; reject at construction
        // rather than inside every infer call
        if !matches!(config.sample_rate, 8000 | 16000 | 32000 | 48000) {
            return Err(DetectorError::Config(format!(
                "frame VAD supports 8, 16, 32 or 48kHz audio, got {}Hz",
                config.sample_rate
            )));
        }

        let segmenter = FrameVad::new(FrameVadConfig {
            frame_ms: config.vad_frame_ms,
            aggressiveness: config.vad_aggressiveness,
            max_gap_frames: config.vad_max_gap_frames,
        })?;

        let mut registry = ClassifierRegistry::new();
        for model in &config.models {
            let model_dir = config.model_dir.join(model);
            registry.register(Box::new(OnnxClassifier::load(model, &model_dir)?));
        }

        Self::new(config, Box::new(segmenter), registry)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Classify an audio file.
    pub fn infer(&mut self, path: &Path) -> Result<Verdict> {
        self.infer_with_deadline(path, None)
    }

    /// Classify an audio file, aborting with `DeadlineExceeded` if the
    /// deadline passes before classification starts. Segmentation and
    /// chunking are cheap; classification dominates the cost, so the check
    /// sits right in front of it.
    pub fn infer_with_deadline(&mut self, path: &Path, deadline: Option<Instant>) -> Result<Verdict> {
        let buffer = load_audio(path, self.config.sample_rate)?;
        info!(
            "Loaded {:?}: {:.2}s at {}Hz",
            path,
            buffer.duration_secs(),
            buffer.sample_rate()
        );
        self.detect_buffer(&buffer, deadline)
    }

    /// Classify an already-decoded buffer (uploaded audio, tests).
    pub fn detect_buffer(
        &mut self,
        buffer: &AudioBuffer,
        deadline: Option<Instant>,
    ) -> Result<Verdict> {
        let intervals = self.segmenter.segments(buffer)?;
        if intervals.is_empty() {
            return Err(DetectorError::NoSpeechDetected);
        }
        debug!("Segmenter found {} speech intervals", intervals.len());

        let chunk_config = ChunkConfig::new(self.config.window_secs, self.config.stride_secs)?;
        let mut chunks: Vec<Chunk> = Vec::new();
        for interval in &intervals {
            chunks.extend(chunk_interval(buffer, interval, &chunk_config));
        }
        info!(
            "{} speech intervals -> {} chunks of {:.1}s (stride {:.1}s)",
            intervals.len(),
            chunks.len(),
            self.config.window_secs,
            self.config.stride_secs
        );

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(DetectorError::DeadlineExceeded);
            }
        }

        let scores = self.registry.classify_all(&chunks, self.config.batch_size)?;
        fuse(&scores, self.config.policy)
    }
}
