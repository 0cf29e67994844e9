//! Routing decisions and their outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::escalation::EscalationMode;
use super::routing::AttentionWeight;
use super::strategy::ParameterVector;

/// Maximum characters of the query kept on a decision.
pub const QUERY_EXCERPT_CHARS: usize = 240;

/// Quality bucket of a completed repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Quality score of at least 7.
    Success,
    /// Quality score in `[4, 7)`.
    Partial,
    /// Quality score below 4.
    Failure,
}

impl OutcomeStatus {
    /// Bucket a `0..=10` quality score.
    pub fn from_quality(quality_score: f64) -> Self {
        if quality_score >= 7.0 {
            Self::Success
        } else if quality_score >= 4.0 {
            Self::Partial
        } else {
            Self::Failure
        }
    }

    /// Learning signal fed into the success-rate EMA.
    pub fn signal(self) -> f64 {
        match self {
            Self::Success => 1.0,
            Self::Partial => 0.5,
            Self::Failure => 0.0,
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Partial => write!(f, "partial"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// Reported result of executing a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: OutcomeStatus,
    /// Whether the executing service reported success.
    pub success: bool,
    pub quality_score: f64,
    pub details: String,
    pub completed_at: DateTime<Utc>,
}

impl Outcome {
    pub fn new(success: bool, quality_score: f64, details: impl Into<String>) -> Self {
        let quality_score = if quality_score.is_finite() {
            quality_score.clamp(0.0, 10.0)
        } else {
            0.0
        };
        Self {
            status: OutcomeStatus::from_quality(quality_score),
            success,
            quality_score,
            details: details.into(),
            completed_at: Utc::now(),
        }
    }

    /// Signal used for learning; a reported failure never counts as success.
    pub fn success_signal(&self) -> f64 {
        if self.success {
            self.status.signal()
        } else {
            0.0
        }
    }

    /// Whether the outcome should move learned parameter values.
    pub fn reinforces_parameters(&self) -> bool {
        self.success_signal() > 0.0
    }
}

/// Lifecycle state of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Pending,
    Completed,
}

/// A routing decision awaiting (or holding) its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: String,
    pub context_type: String,
    pub archetype: String,
    pub query_excerpt: String,
    pub selected_option: String,
    pub parameter_vector_used: ParameterVector,
    pub attention_weights: Vec<AttentionWeight>,
    pub mode: EscalationMode,
    /// Transformational decisions are recorded but never learned from.
    pub learnable: bool,
    /// Extensions of the selected option, e.g. recorded failure reasons.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub outcome: Option<Outcome>,
}

impl Decision {
    /// New PENDING decision with a fresh unique id.
    pub fn pending(
        context_type: impl Into<String>,
        archetype: impl Into<String>,
        query: &str,
        selected_option: impl Into<String>,
        parameter_vector_used: ParameterVector,
        attention_weights: Vec<AttentionWeight>,
        mode: EscalationMode,
    ) -> Self {
        Self {
            decision_id: Uuid::new_v4().to_string(),
            context_type: context_type.into(),
            archetype: archetype.into(),
            query_excerpt: excerpt(query, QUERY_EXCERPT_CHARS),
            selected_option: selected_option.into(),
            parameter_vector_used,
            attention_weights,
            mode,
            learnable: mode != EscalationMode::Transformational,
            extensions: BTreeMap::new(),
            created_at: Utc::now(),
            outcome: None,
        }
    }

    #[must_use]
    pub fn with_extensions(mut self, extensions: BTreeMap<String, serde_json::Value>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn status(&self) -> DecisionStatus {
        if self.outcome.is_some() {
            DecisionStatus::Completed
        } else {
            DecisionStatus::Pending
        }
    }

    /// Attach the outcome. A completed decision never reverts.
    pub fn complete(&mut self, outcome: Outcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }
}

/// Truncate text to at most `max_chars` characters on a char boundary.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
