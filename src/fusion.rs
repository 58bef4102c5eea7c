//! Score fusion and the final decision
//!
//! Every chunk from every speech interval counts equally in a model's
//! aggregate, regardless of interval length. The majority policy uses a
//! strict majority (`votes > models / 2`): with an even ensemble a tie falls
//! to Human, a deliberate conservative bias.

use crate::classifier::ClassScores;
use crate::config::DecisionPolicy;
use crate::error::{DetectorError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Aggregate fake-score above which a single model votes "fake"
pub const FAKE_THRESHOLD: f32 = 0.5;

/// Final classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Label {
    #[serde(rename = "AI-generated")]
    AiGenerated,
    #[serde(rename = "Human")]
    Human,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::AiGenerated => write!(f, "AI-generated"),
            Label::Human => write!(f, "Human"),
        }
    }
}

/// Terminal artifact of one pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub label: Label,
    /// Mean of per-model aggregate fake-scores, in [0, 1]
    pub probability: f32,
    /// Aggregate fake-score per model
    pub per_model: BTreeMap<String, f32>,
}

/// Fuse per-chunk, per-model scores into a single verdict.
///
/// The per-model aggregate is the unweighted mean of that model's fake-class
/// probability across all chunks. The reported probability is always the mean
/// of the aggregates; only the label depends on the policy.
pub fn fuse(
    scores: &BTreeMap<String, Vec<ClassScores>>,
    policy: DecisionPolicy,
) -> Result<Verdict> {
    if scores.is_empty() {
        return Err(DetectorError::Config("fusion requires at least one model".into()));
    }

    let mut per_model = BTreeMap::new();
    for (model, chunk_scores) in scores {
        if chunk_scores.is_empty() {
            return Err(DetectorError::Config(format!(
                "model '{}' produced no chunk scores",
                model
            )));
        }
        let sum: f32 = chunk_scores.iter().map(|s| s.fake_score()).sum();
        per_model.insert(model.clone(), sum / chunk_scores.len() as f32);
    }

    let num_models = per_model.len();
    let mean: f32 = per_model.values().sum::<f32>() / num_models as f32;

    let label = match policy {
        DecisionPolicy::Average => {
            if mean > FAKE_THRESHOLD {
                Label::AiGenerated
            } else {
                Label::Human
            }
        }
        DecisionPolicy::Majority => {
            let votes = per_model
                .values()
                .filter(|&&score| score > FAKE_THRESHOLD)
                .count();
            // Strict majority: a tie resolves to Human
            if votes * 2 > num_models {
                Label::AiGenerated
            } else {
                Label::Human
            }
        }
    };

    info!(
        "Fused {} models ({:?}): label={}, probability={:.3}",
        num_models, policy, label, mean
    );

    Ok(Verdict {
        label,
        probability: mean,
        per_model,
    })
}
