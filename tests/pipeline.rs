//! End-to-end pipeline tests with scripted classifiers.
//!
//! Classifier models are external collaborators, so these tests drive the
//! full pipeline (load, segment, chunk, batch, fuse) with deterministic mock
//! providers instead of real ONNX sessions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use voiceproof::audio::{AudioBuffer, EnergyVad};
use voiceproof::classifier::{ClassifierRegistry, FAKE_LABEL, REAL_LABEL};
use voiceproof::{
    ChunkClassifier, ClassScores, DecisionPolicy, Detector, PipelineConfig, Result,
};

/// Returns a fixed fake-score for every chunk and records observed batch sizes
struct ScriptedClassifier {
    name: String,
    fake: f32,
    batch_sizes: Mutex<Vec<usize>>,
}

impl ScriptedClassifier {
    fn new(name: &str, fake: f32) -> Self {
        Self {
            name: name.to_string(),
            fake,
            batch_sizes: Mutex::new(Vec::new()),
        }
    }
}

impl ChunkClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify_batch(&self, chunks: &[voiceproof::Chunk]) -> Result<Vec<ClassScores>> {
        self.batch_sizes.lock().unwrap().push(chunks.len());
        Ok(chunks
            .iter()
            .map(|_| {
                [
                    (FAKE_LABEL.to_string(), self.fake),
                    (REAL_LABEL.to_string(), 1.0 - self.fake),
                ]
                .into_iter()
                .collect()
            })
            .collect())
    }
}

/// Scores chunks by their index, so reordering or re-batching would show up
struct IndexedClassifier {
    scores: Vec<f32>,
    cursor: Mutex<usize>,
}

impl ChunkClassifier for IndexedClassifier {
    fn name(&self) -> &str {
        "indexed"
    }

    fn classify_batch(&self, chunks: &[voiceproof::Chunk]) -> Result<Vec<ClassScores>> {
        let mut cursor = self.cursor.lock().unwrap();
        let out = chunks
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let fake = self.scores[(*cursor + i) % self.scores.len()];
                [
                    (FAKE_LABEL.to_string(), fake),
                    (REAL_LABEL.to_string(), 1.0 - fake),
                ]
                .into_iter()
                .collect()
            })
            .collect();
        *cursor += chunks.len();
        Ok(out)
    }
}

fn config(policy: DecisionPolicy) -> PipelineConfig {
    PipelineConfig {
        policy,
        ..Default::default()
    }
}

fn detector(policy: DecisionPolicy, models: Vec<Box<dyn ChunkClassifier>>) -> Detector {
    let mut registry = ClassifierRegistry::new();
    for model in models {
        registry.register(model);
    }
    Detector::new(config(policy), Box::new(EnergyVad::default()), registry).unwrap()
}

/// Four seconds of loud periodic signal: always passes the energy VAD
fn speech_buffer() -> AudioBuffer {
    let samples: Vec<f32> = (0..64000).map(|i| (i as f32 * 0.2).sin() * 0.6).collect();
    AudioBuffer::from_samples(samples, 16000)
}

#[test]
fn verdict_label_and_probability_are_well_formed() {
    let mut detector = detector(
        DecisionPolicy::Average,
        vec![Box::new(ScriptedClassifier::new("m1", 0.73))],
    );
    let verdict = detector.detect_buffer(&speech_buffer(), None).unwrap();

    assert!(matches!(verdict.label.to_string().as_str(), "AI-generated" | "Human"));
    assert!(verdict.probability >= 0.0 && verdict.probability <= 1.0);
    assert_eq!(verdict.per_model.len(), 1);
}

#[test]
fn average_policy_end_to_end() {
    let mut detector = detector(
        DecisionPolicy::Average,
        vec![
            Box::new(ScriptedClassifier::new("m1", 0.6)),
            Box::new(ScriptedClassifier::new("m2", 0.7)),
        ],
    );
    let verdict = detector.detect_buffer(&speech_buffer(), None).unwrap();

    assert!((verdict.probability - 0.65).abs() < 1e-5);
    assert_eq!(verdict.label.to_string(), "AI-generated");
}

#[test]
fn majority_tie_falls_to_human_end_to_end() {
    let mut detector = detector(
        DecisionPolicy::Majority,
        vec![
            Box::new(ScriptedClassifier::new("m1", 0.9)),
            Box::new(ScriptedClassifier::new("m2", 0.4)),
        ],
    );
    let verdict = detector.detect_buffer(&speech_buffer(), None).unwrap();

    assert_eq!(verdict.label.to_string(), "Human");
    assert!((verdict.probability - 0.65).abs() < 1e-5);
}

#[test]
fn pure_silence_fails_with_no_speech() {
    let mut detector = detector(
        DecisionPolicy::Average,
        vec![Box::new(ScriptedClassifier::new("m1", 0.9))],
    );
    let silence = AudioBuffer::from_samples(vec![0.0f32; 48000], 16000);
    let err = detector.detect_buffer(&silence, None).unwrap_err();
    assert_eq!(err.kind(), "no_speech_detected");
}

#[test]
fn batch_size_invariance_end_to_end() {
    let scores: Vec<f32> = (0..16).map(|i| i as f32 / 16.0).collect();

    let run = |batch_size: usize| -> HashMap<String, f32> {
        let mut cfg = config(DecisionPolicy::Average);
        cfg.batch_size = batch_size;
        let mut registry = ClassifierRegistry::new();
        registry.register(Box::new(IndexedClassifier {
            scores: scores.clone(),
            cursor: Mutex::new(0),
        }));
        let mut detector =
            Detector::new(cfg, Box::new(EnergyVad::default()), registry).unwrap();
        let verdict = detector.detect_buffer(&speech_buffer(), None).unwrap();
        verdict.per_model.into_iter().collect()
    };

    let of_eight = run(8);
    let of_four = run(4);
    assert_eq!(of_eight, of_four);
}

#[test]
fn unreadable_file_surfaces_typed_error() {
    let mut detector = detector(
        DecisionPolicy::Average,
        vec![Box::new(ScriptedClassifier::new("m1", 0.5))],
    );
    let err = detector
        .infer(&PathBuf::from("/definitely/not/here.wav"))
        .unwrap_err();
    assert_eq!(err.kind(), "unreadable_audio");
}

#[test]
fn wav_file_round_trips_through_infer() {
    let path = std::env::temp_dir().join(format!("voiceproof-test-{}.wav", std::process::id()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..64000 {
        let sample = ((i as f32 * 0.2).sin() * 0.6 * 32767.0) as i16;
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();

    let mut detector = detector(
        DecisionPolicy::Average,
        vec![Box::new(ScriptedClassifier::new("m1", 0.8))],
    );
    let verdict = detector.infer(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(verdict.label.to_string(), "AI-generated");
    assert!((verdict.probability - 0.8).abs() < 1e-5);
}

#[test]
fn verdict_serializes_like_the_wire_format() {
    let mut detector = detector(
        DecisionPolicy::Average,
        vec![Box::new(ScriptedClassifier::new("m1", 0.8))],
    );
    let verdict = detector.detect_buffer(&speech_buffer(), None).unwrap();

    let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&verdict).unwrap()).unwrap();
    assert_eq!(json["label"], "AI-generated");
    assert!(json["probability"].as_f64().unwrap() > 0.5);
    assert!(json["per_model"]["m1"].as_f64().is_some());
}
