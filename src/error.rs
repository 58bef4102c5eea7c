use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors surfaced by the detection pipeline
///
/// Every internal failure is wrapped into one of these variants before it
/// reaches the caller of the pipeline entry point. No partial verdicts are
/// ever returned alongside an error.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Input file could not be decoded to a sample buffer
    #[error("unreadable audio: {0}")]
    UnreadableAudio(String),

    /// Valid audio, but no usable speech signal was found
    #[error("no speech detected in input")]
    NoSpeechDetected,

    /// A classifier model failed to load or run. Fatal for the whole
    /// invocation: fusion assumes a fixed, known model count.
    #[error("classifier '{model}' unavailable: {reason}")]
    ClassifierUnavailable { model: String, reason: String },

    /// Invalid pipeline configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// External deadline expired before classification started
    #[error("deadline exceeded before classification")]
    DeadlineExceeded,
}

impl DetectorError {
    /// Stable kind tag for the serving layer (maps to HTTP status etc.)
    pub fn kind(&self) -> &'static str {
        match self {
            DetectorError::UnreadableAudio(_) => "unreadable_audio",
            DetectorError::NoSpeechDetected => "no_speech_detected",
            DetectorError::ClassifierUnavailable { .. } => "classifier_unavailable",
            DetectorError::Config(_) => "config",
            DetectorError::DeadlineExceeded => "deadline_exceeded",
        }
    }
}
