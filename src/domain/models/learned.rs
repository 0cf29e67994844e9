//! Learned statistics and long-term outcome corpora.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use super::strategy::{numeric_entries, ParameterVector};

/// Scope of a learned record: `(context type, archetype, option id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearnedKey {
    pub context_type: String,
    pub archetype: String,
    pub option_id: String,
}

impl LearnedKey {
    pub fn new(
        context_type: impl Into<String>,
        archetype: impl Into<String>,
        option_id: impl Into<String>,
    ) -> Self {
        Self {
            context_type: context_type.into(),
            archetype: archetype.into(),
            option_id: option_id.into(),
        }
    }
}

impl fmt::Display for LearnedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.context_type, self.archetype, self.option_id)
    }
}

/// Historical statistics for one strategy option in one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedRecord {
    pub key: LearnedKey,
    pub success_rate: f64,
    /// Monotonically non-decreasing.
    pub sample_count: u64,
    /// Weight given to learned values when blending, in `[0, 1)`.
    pub confidence: f64,
    pub ema_values: BTreeMap<String, f64>,
    pub updated_at: DateTime<Utc>,
}

impl LearnedRecord {
    /// Record with no history yet.
    pub fn empty(key: LearnedKey) -> Self {
        Self {
            key,
            success_rate: 0.0,
            sample_count: 0,
            confidence: 0.0,
            ema_values: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Fold one outcome into the record.
    ///
    /// The first observation seeds the success rate and every EMA it touches;
    /// later ones apply `ema = alpha * observed + (1 - alpha) * prior`.
    /// `observed` carries the parameter values to reinforce, or `None` when
    /// the outcome should only move the success statistics.
    pub fn observe(
        &mut self,
        alpha: f64,
        success_signal: f64,
        observed: Option<&ParameterVector>,
        saturation_samples: f64,
    ) {
        self.success_rate = if self.sample_count == 0 {
            success_signal
        } else {
            alpha.mul_add(success_signal, (1.0 - alpha) * self.success_rate)
        };

        if let Some(params) = observed {
            for (key, value) in numeric_entries(params) {
                self.ema_values
                    .entry(key.clone())
                    .and_modify(|prior| *prior = alpha.mul_add(value, (1.0 - alpha) * *prior))
                    .or_insert(value);
            }
        }

        self.sample_count += 1;
        self.confidence = confidence_weight(self.sample_count, saturation_samples);
        self.updated_at = Utc::now();
    }
}

/// Saturating weight for `n` samples: `n / (n + saturation)`.
///
/// Zero only when there are no samples; tends to one as samples accumulate.
pub fn confidence_weight(sample_count: u64, saturation_samples: f64) -> f64 {
    if sample_count == 0 {
        return 0.0;
    }
    let n = sample_count as f64;
    n / (n + saturation_samples.max(f64::MIN_POSITIVE))
}

/// An option with a poor historical success record in some context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiPattern {
    pub option_id: String,
    pub success_rate: f64,
    pub sample_count: u64,
}

impl From<&LearnedRecord> for AntiPattern {
    fn from(record: &LearnedRecord) -> Self {
        Self {
            option_id: record.key.option_id.clone(),
            success_rate: record.success_rate,
            sample_count: record.sample_count,
        }
    }
}

/// Recorded failures of one option.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FailureOccurrence {
    pub count: u32,
    /// Most recent reasons first.
    pub reasons: Vec<String>,
}

/// Failure occurrences keyed by option id.
pub type FailureHistory = HashMap<String, FailureOccurrence>;

/// A high-quality success kept in the long-term corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessCase {
    pub id: String,
    pub context_type: String,
    pub archetype: String,
    pub error_excerpt: String,
    pub strategy_id: String,
    pub parameters: ParameterVector,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl SuccessCase {
    pub fn new(
        context_type: impl Into<String>,
        archetype: impl Into<String>,
        error_excerpt: impl Into<String>,
        strategy_id: impl Into<String>,
        parameters: ParameterVector,
        quality_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_type: context_type.into(),
            archetype: archetype.into(),
            error_excerpt: error_excerpt.into(),
            strategy_id: strategy_id.into(),
            parameters,
            quality_score,
            created_at: Utc::now(),
        }
    }
}

/// A low-quality failure kept in the long-term anti-pattern corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntiPatternEntry {
    pub id: String,
    pub context_type: String,
    pub archetype: String,
    pub option_id: String,
    pub error_excerpt: String,
    pub reason: String,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
}

impl AntiPatternEntry {
    pub fn new(
        context_type: impl Into<String>,
        archetype: impl Into<String>,
        option_id: impl Into<String>,
        error_excerpt: impl Into<String>,
        reason: impl Into<String>,
        quality_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_type: context_type.into(),
            archetype: archetype.into(),
            option_id: option_id.into(),
            error_excerpt: error_excerpt.into(),
            reason: reason.into(),
            quality_score,
            created_at: Utc::now(),
        }
    }
}
