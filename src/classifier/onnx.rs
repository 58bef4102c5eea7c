//! ONNX Runtime classifier backend
//!
//! Loads an exported audio-classification model (wav2vec2-style: raw waveform
//! in, per-class logits out) and exposes it through the `ChunkClassifier`
//! trait. Expected layout per model directory:
//! - model.onnx: the exported graph, input `[batch, samples]` f32,
//!   output `logits` `[batch, num_labels]`
//! - labels.txt: one class label per line, in logit order (optional;
//!   defaults to fake/real)

use crate::audio::Chunk;
use crate::classifier::{ChunkClassifier, ClassScores, FAKE_LABEL, REAL_LABEL};
use crate::error::{DetectorError, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Deepfake classifier backed by an ONNX Runtime session
#[derive(Debug)]
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
    labels: Vec<String>,
}

unsafe impl Send for OnnxClassifier {}
unsafe impl Sync for OnnxClassifier {}

impl OnnxClassifier {
    /// Load `model.onnx` (and `labels.txt` if present) from `model_dir`.
    pub fn load(name: &str, model_dir: &Path) -> Result<Self> {
        info!("Loading ONNX classifier '{}' from {:?}", name, model_dir);

        // commit() returns bool in ort 2.0; re-initialization is a no-op
        let _ = ort::init().with_name("voiceproof").commit();

        let model_path = model_dir.join("model.onnx");
        let session = Session::builder()
            .map_err(|e| unavailable(name, format!("failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| unavailable(name, format!("failed to set optimization level: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| unavailable(name, format!("failed to load {:?}: {}", model_path, e)))?;

        let labels_path = model_dir.join("labels.txt");
        let labels = if labels_path.exists() {
            let raw = std::fs::read_to_string(&labels_path)
                .map_err(|e| unavailable(name, format!("failed to read {:?}: {}", labels_path, e)))?;
            let labels: Vec<String> = raw
                .lines()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect();
            if labels.is_empty() {
                return Err(unavailable(name, format!("{:?} contains no labels", labels_path)));
            }
            labels
        } else {
            debug!("No labels.txt for '{}', assuming fake/real", name);
            vec![FAKE_LABEL.to_string(), REAL_LABEL.to_string()]
        };

        info!("Classifier '{}' loaded with labels {:?}", name, labels);
        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            labels,
        })
    }
}

impl ChunkClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify_batch(&self, chunks: &[Chunk]) -> Result<Vec<ClassScores>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        // Chunks are fixed-length by construction; verify before flattening
        let chunk_len = chunks[0].samples.len();
        if chunks.iter().any(|c| c.samples.len() != chunk_len) {
            return Err(unavailable(&self.name, "batch contains uneven chunk lengths".to_string()));
        }

        let mut flat = Vec::with_capacity(chunks.len() * chunk_len);
        for chunk in chunks {
            flat.extend_from_slice(&chunk.samples);
        }

        let input = Tensor::from_array(([chunks.len(), chunk_len], flat))
            .map_err(|e| unavailable(&self.name, format!("failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock().unwrap();
        let outputs = session
            .run(ort::inputs!["input_values" => input])
            .map_err(|e| unavailable(&self.name, format!("inference failed: {}", e)))?;

        let (shape, logits) = outputs["logits"]
            .try_extract_tensor::<f32>()
            .map_err(|e| unavailable(&self.name, format!("failed to extract logits: {}", e)))?;

        let num_labels = shape[1] as usize;
        if num_labels != self.labels.len() {
            return Err(unavailable(
                &self.name,
                format!(
                    "model emits {} classes but {} labels are configured",
                    num_labels,
                    self.labels.len()
                ),
            ));
        }

        let mut scores = Vec::with_capacity(chunks.len());
        for row in logits.chunks(num_labels) {
            let probabilities = softmax(row);
            scores.push(
                self.labels
                    .iter()
                    .cloned()
                    .zip(probabilities)
                    .collect::<ClassScores>(),
            );
        }

        debug!("'{}' classified batch of {}", self.name, chunks.len());
        Ok(scores)
    }
}

fn unavailable(model: &str, reason: String) -> DetectorError {
    DetectorError::ClassifierUnavailable {
        model: model.to_string(),
        reason,
    }
}

/// Numerically stable softmax over one logit row
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().fold(f32::NEG_INFINITY, |m, &l| m.max(l));
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
