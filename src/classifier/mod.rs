//! Classifier ensemble
//!
//! Pretrained deepfake classifiers are opaque capability providers behind the
//! `ChunkClassifier` trait: give them a batch of fixed-length chunks, get one
//! class-probability map per chunk back. A registry maps model names to
//! provider instances; how many models run is purely configuration.

pub mod onnx;

pub use onnx::OnnxClassifier;

use crate::audio::Chunk;
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Canonical class label for synthesized speech
pub const FAKE_LABEL: &str = "fake";
/// Canonical class label for genuine speech
pub const REAL_LABEL: &str = "real";

/// Per-chunk class probabilities from one model.
///
/// Label lookup is case-insensitive; a label the classifier did not emit
/// scores as 0.0 rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassScores(HashMap<String, f32>);

impl ClassScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, probability: f32) {
        self.0.insert(label.into().to_lowercase(), probability);
    }

    /// Probability for `label`, 0.0 if the classifier never emitted it
    pub fn score(&self, label: &str) -> f32 {
        self.0.get(&label.to_lowercase()).copied().unwrap_or(0.0)
    }

    pub fn fake_score(&self) -> f32 {
        self.score(FAKE_LABEL)
    }

    pub fn real_score(&self) -> f32 {
        self.score(REAL_LABEL)
    }
}

impl FromIterator<(String, f32)> for ClassScores {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        let mut scores = Self::new();
        for (label, probability) in iter {
            scores.insert(label, probability);
        }
        scores
    }
}

/// Capability contract for a deepfake classifier.
///
/// `classify_batch` returns exactly one score map per input chunk, in input
/// order. Implementations may parallelize across the batch internally but
/// must not reorder results.
pub trait ChunkClassifier: Send + Sync {
    /// Model identifier used in the verdict's per-model breakdown
    fn name(&self) -> &str;

    fn classify_batch(&self, chunks: &[Chunk]) -> Result<Vec<ClassScores>>;
}

/// Registry mapping model name to its provider instance
#[derive(Default)]
pub struct ClassifierRegistry {
    models: BTreeMap<String, Box<dyn ChunkClassifier>>,
}

impl ClassifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, classifier: Box<dyn ChunkClassifier>) {
        let name = classifier.name().to_string();
        info!("Registered classifier '{}'", name);
        self.models.insert(name, classifier);
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|k| k.as_str())
    }

    /// Score every chunk with every registered model.
    ///
    /// Chunks are grouped into fixed-size batches purely for throughput;
    /// batch size never changes the scores, and per-chunk order is preserved
    /// so scores map back to the correct chunk. If any model fails, the whole
    /// call fails: fusion assumes a fixed model count, so a run is never
    /// silently averaged over fewer models.
    pub fn classify_all(
        &self,
        chunks: &[Chunk],
        batch_size: usize,
    ) -> Result<BTreeMap<String, Vec<ClassScores>>> {
        let batch_size = batch_size.max(1);
        let mut all_scores = BTreeMap::new();

        for (name, model) in &self.models {
            let mut scores = Vec::with_capacity(chunks.len());
            for batch in chunks.chunks(batch_size) {
                let batch_scores = model.classify_batch(batch).map_err(|e| {
                    DetectorError::ClassifierUnavailable {
                        model: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                if batch_scores.len() != batch.len() {
                    return Err(DetectorError::ClassifierUnavailable {
                        model: name.clone(),
                        reason: format!(
                            "returned {} results for a batch of {}",
                            batch_scores.len(),
                            batch.len()
                        ),
                    });
                }
                scores.extend(batch_scores);
            }
            debug!("Model '{}' scored {} chunks", name, scores.len());
            all_scores.insert(name.clone(), scores);
        }

        Ok(all_scores)
    }
}
