//! voiceproof: audio deepfake detection pipeline
//!
//! Flow: file -> loader (16kHz mono, peak-normalized) -> speech segmenter
//! (VAD) -> overlapping fixed windows -> classifier ensemble -> score fusion
//! -> verdict.

pub mod audio;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fusion;
pub mod pipeline;

pub use audio::{AudioBuffer, Chunk, ChunkConfig, SpeechInterval, SpeechSegmenter};
pub use classifier::{ChunkClassifier, ClassScores, ClassifierRegistry};
pub use config::{DecisionPolicy, PipelineConfig};
pub use error::{DetectorError, Result};
pub use fusion::{Label, Verdict};
pub use pipeline::Detector;
