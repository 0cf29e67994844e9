//! Strategy options and their typed parameter vectors.
//!
//! A [`StrategyOption`] is a catalog entry describing one way of repairing a
//! failed artifact. Its [`ParameterVector`] holds the knobs that control how
//! the repair executes (edit limits, verification toggles, approach names).
//! Numeric knobs are blended by the attention router; boolean and text knobs
//! are taken from the winning option.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Parameter key synthesized by the anti-pattern guard.
///
/// Holds a reliability factor in `(0, 1]` that the attention router folds
/// into the option's logit. Never part of a blended output vector.
pub const RELIABILITY_PARAM: &str = "routing_reliability";

/// Extension key under which the anti-pattern guard attaches failure reasons.
pub const FAILURE_REASONS_EXT: &str = "failure_reasons";

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric value, if this parameter is numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean value, if this parameter is a flag.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text value, if this parameter is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n:.3}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Ordered map of parameter name to value.
///
/// `BTreeMap` keeps iteration and serialization order stable, so blended
/// output is independent of insertion order.
pub type ParameterVector = BTreeMap<String, ParamValue>;

/// A catalog-defined repair strategy candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOption {
    /// Stable identifier (e.g. `"syntax-fix"`).
    pub id: String,
    /// Human-readable description; also the text embedded as the option's key.
    pub description: String,
    /// Typed parameter knobs.
    #[serde(default)]
    pub parameters: ParameterVector,
    /// Forward-compatible custom keys, carried through untouched.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl StrategyOption {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            parameters: ParameterVector::new(),
            extensions: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Text embedded as this option's attention key.
    pub fn key_text(&self) -> &str {
        if self.description.trim().is_empty() {
            &self.id
        } else {
            &self.description
        }
    }

    /// Numeric parameter lookup.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).and_then(ParamValue::as_number)
    }

    /// Reliability injected by the anti-pattern guard, `1.0` when absent.
    pub fn reliability(&self) -> f64 {
        self.number(RELIABILITY_PARAM).unwrap_or(1.0)
    }

    /// Reason this option cannot take part in routing, if any.
    ///
    /// Empty ids and non-finite numeric parameters are malformed; duplicate
    /// ids are detected by the caller, which sees the whole candidate set.
    pub fn malformation(&self) -> Option<String> {
        if self.id.trim().is_empty() {
            return Some("empty option id".to_string());
        }
        self.parameters.iter().find_map(|(key, value)| match value {
            ParamValue::Number(n) if !n.is_finite() => {
                Some(format!("parameter '{key}' is not finite ({n})"))
            }
            _ => None,
        })
    }
}

/// A strategy option after the evolution store blended learned values in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolvedOption {
    /// The option with blended numeric parameters.
    pub option: StrategyOption,
    /// Weight given to learned values, in `[0, 1)`. Zero when no history exists.
    pub confidence_weight: f64,
    /// Historical samples behind the blend.
    pub sample_count: u64,
    /// Historical success rate, when a learned record exists.
    pub success_rate: Option<f64>,
}

impl EvolvedOption {
    /// Option passed through without learned history.
    pub fn unchanged(option: StrategyOption) -> Self {
        Self {
            option,
            confidence_weight: 0.0,
            sample_count: 0,
            success_rate: None,
        }
    }

    pub fn is_learned(&self) -> bool {
        self.sample_count > 0
    }

    pub fn into_option(self) -> StrategyOption {
        self.option
    }
}

/// Keep only the numeric entries of a parameter vector.
pub fn numeric_entries(params: &ParameterVector) -> impl Iterator<Item = (&String, f64)> {
    params
        .iter()
        .filter_map(|(key, value)| value.as_number().map(|n| (key, n)))
}
