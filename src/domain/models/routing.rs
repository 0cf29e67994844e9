//! Attention routing results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::escalation::EscalationMode;
use super::strategy::ParameterVector;

/// Attention weight assigned to one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionWeight {
    pub option_id: String,
    pub weight: f64,
}

/// Why a routing call completed in degraded form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedReason {
    /// The embedding provider failed for these texts; hash fallbacks were used.
    EmbeddingFallback { texts: usize },
    /// The embedding fan-out timed out; weights are uniform.
    EmbeddingTimeout,
    /// The computed winner fell below the confidence floor.
    LowConfidence { computed_id: String, confidence: f64 },
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmbeddingFallback { texts } => write!(f, "fallback embeddings for {texts} texts"),
            Self::EmbeddingTimeout => write!(f, "embedding timed out, uniform weights"),
            Self::LowConfidence {
                computed_id,
                confidence,
            } => write!(f, "low confidence {confidence:.3} for {computed_id}"),
        }
    }
}

impl fmt::Display for RoutingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nominal => write!(f, "nominal"),
            Self::Degraded { reasons } => {
                let reasons: Vec<String> = reasons.iter().map(ToString::to_string).collect();
                write!(f, "degraded ({})", reasons.join("; "))
            }
        }
    }
}

/// Tagged routing status: callers can tell "succeeded but degraded" from nominal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoutingStatus {
    #[default]
    Nominal,
    Degraded { reasons: Vec<DegradedReason> },
}

impl RoutingStatus {
    pub fn from_reasons(reasons: Vec<DegradedReason>) -> Self {
        if reasons.is_empty() {
            Self::Nominal
        } else {
            Self::Degraded { reasons }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reasons(&self) -> &[DegradedReason] {
        match self {
            Self::Nominal => &[],
            Self::Degraded { reasons } => reasons,
        }
    }
}

/// Output of one attention routing call.
///
/// Weights are the softmax output: non-negative, summing to one, in the
/// candidates' original order. `confidence` is the selected option's weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub selected_id: String,
    pub parameter_vector: ParameterVector,
    pub attention_weights: Vec<AttentionWeight>,
    pub confidence: f64,
    pub decision_id: String,
    pub mode: EscalationMode,
    pub status: RoutingStatus,
    /// Extensions of the selected option.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl RoutingResult {
    /// Weight of the given option, if it was a candidate.
    pub fn weight_of(&self, option_id: &str) -> Option<f64> {
        self.attention_weights
            .iter()
            .find(|w| w.option_id == option_id)
            .map(|w| w.weight)
    }
}
