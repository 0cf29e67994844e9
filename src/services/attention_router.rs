//! Attention router.
//!
//! Scores candidate strategies against an error text with scaled dot-product
//! attention and blends their numeric parameters by the resulting weights,
//! instead of picking one option outright.
//!
//! Per call:
//! 1. Malformed and duplicate candidates are dropped with a warning.
//! 2. The query and every candidate key text are embedded concurrently.
//! 3. `logit_i = dot(Q, K_i) / sqrt(d) / temperature + ln(reliability_i)`.
//! 4. A max-subtracted softmax turns logits into weights.
//! 5. Each numeric key is averaged over the candidates that define it, with
//!    weights renormalized over that subset. Flags and text come from the
//!    winner.
//! 6. A winner below the confidence floor is overridden by the default
//!    strategy.
//! 7. A PENDING decision carrying the winner's extensions is registered and
//!    its id returned.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::models::{
    dot, AttentionWeight, Decision, DegradedReason, EscalationMode, ParamValue, ParameterVector,
    RouterConfig, RoutingResult, RoutingStatus, StrategyOption, RELIABILITY_PARAM,
};
use crate::services::decision_ledger::DecisionLedger;
use crate::services::embedding_cache::{EmbeddingBatch, EmbeddingCache};

/// Smallest reliability folded into a logit, keeping `ln` finite.
const MIN_RELIABILITY: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    #[error("No valid candidate strategies to route over")]
    NoCandidates,

    #[error("Embedding dimension mismatch for '{text}': expected {expected}, got {actual}")]
    DimensionMismatch {
        text: String,
        expected: usize,
        actual: usize,
    },
}

/// One routing call's inputs besides the candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRequest {
    pub query: String,
    pub context_type: String,
    pub archetype: String,
    /// Strategy that replaces a winner below the confidence floor.
    pub default_strategy: Option<String>,
    pub mode: EscalationMode,
}

impl RouteRequest {
    pub fn new(
        query: impl Into<String>,
        context_type: impl Into<String>,
        archetype: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            context_type: context_type.into(),
            archetype: archetype.into(),
            default_strategy: None,
            mode: EscalationMode::Standard,
        }
    }

    #[must_use]
    pub fn with_default_strategy(mut self, option_id: impl Into<String>) -> Self {
        self.default_strategy = Some(option_id.into());
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: EscalationMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Scaled similarity of a query against a set of key texts.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyScores {
    /// `dot(Q, K_i) / sqrt(d)`, in key order. Empty when embedding timed out.
    pub scores: Vec<f64>,
    pub degraded: Vec<DegradedReason>,
}

/// `dot(query, key) / sqrt(d)`. Callers guarantee equal lengths.
pub fn scaled_dot_product(query: &[f32], key: &[f32]) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    dot(query, key) / (query.len() as f64).sqrt()
}

/// Numerically stable softmax.
///
/// Subtracts the maximum logit before exponentiating. Degenerate input
/// (no finite logit) yields uniform weights.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return vec![1.0 / logits.len() as f64; logits.len()];
    }

    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest weight; ties go to the earliest index.
pub fn stable_argmax(weights: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, w) in weights.iter().enumerate() {
        match best {
            Some(b) if *w <= weights[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Blend parameter vectors by attention weight.
///
/// Numeric keys are averaged over the options that define them, with the
/// weights renormalized over that subset. Flags and text come from the
/// `selected` option only; keys it does not define are left out.
pub fn blend_parameters(
    options: &[StrategyOption],
    weights: &[f64],
    selected: usize,
) -> ParameterVector {
    let keys: BTreeSet<&String> = options
        .iter()
        .flat_map(|o| o.parameters.keys())
        .filter(|k| k.as_str() != RELIABILITY_PARAM)
        .collect();

    let mut blended = ParameterVector::new();
    for key in keys {
        let numeric: Vec<(f64, f64)> = options
            .iter()
            .zip(weights)
            .filter_map(|(o, w)| o.number(key).map(|v| (*w, v)))
            .collect();

        if !numeric.is_empty() {
            let total: f64 = numeric.iter().map(|(w, _)| w).sum();
            let value = if total > 0.0 {
                numeric.iter().map(|(w, v)| w * v).sum::<f64>() / total
            } else {
                numeric.iter().map(|(_, v)| v).sum::<f64>() / numeric.len() as f64
            };
            blended.insert(key.clone(), ParamValue::Number(value));
            continue;
        }

        if let Some(value) = options[selected].parameters.get(key) {
            blended.insert(key.clone(), value.clone());
        }
    }
    blended
}

/// Own parameters of an option, without routing-only keys.
fn own_parameters(option: &StrategyOption) -> ParameterVector {
    option
        .parameters
        .iter()
        .filter(|(k, _)| k.as_str() != RELIABILITY_PARAM)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Drop malformed and duplicate candidates, keeping the first of each id.
fn sanitize(options: Vec<StrategyOption>) -> Vec<StrategyOption> {
    let mut seen = HashSet::new();
    options
        .into_iter()
        .filter(|option| {
            if let Some(reason) = option.malformation() {
                warn!(option_id = %option.id, reason = %reason, "Dropping malformed candidate");
                return false;
            }
            if !seen.insert(option.id.clone()) {
                warn!(option_id = %option.id, "Dropping duplicate candidate");
                return false;
            }
            true
        })
        .collect()
}

pub struct AttentionRouter {
    embeddings: Arc<EmbeddingCache>,
    ledger: Arc<DecisionLedger>,
    confidence_floor: f64,
    temperature: f64,
}

impl AttentionRouter {
    pub fn new(
        embeddings: Arc<EmbeddingCache>,
        ledger: Arc<DecisionLedger>,
        config: &RouterConfig,
    ) -> Self {
        Self {
            embeddings,
            ledger,
            confidence_floor: config.confidence_floor,
            temperature: config.temperature,
        }
    }

    pub fn confidence_floor(&self) -> f64 {
        self.confidence_floor
    }

    /// Scaled dot-product of `query` against each key text.
    ///
    /// Shared by routing and the cross-archetype search.
    pub async fn score_keys(&self, query: &str, keys: &[&str]) -> Result<KeyScores, RouterError> {
        let mut texts = Vec::with_capacity(keys.len() + 1);
        texts.push(query);
        texts.extend_from_slice(keys);

        let embedded = match self.embeddings.embed_many(&texts).await {
            EmbeddingBatch::Ready(embedded) => embedded,
            EmbeddingBatch::TimedOut => {
                return Ok(KeyScores {
                    scores: Vec::new(),
                    degraded: vec![DegradedReason::EmbeddingTimeout],
                })
            }
        };

        let mut degraded = Vec::new();
        let fallbacks = embedded.iter().filter(|e| e.fallback).count();
        if fallbacks > 0 {
            degraded.push(DegradedReason::EmbeddingFallback { texts: fallbacks });
        }

        let query_vector = &embedded[0].vector;
        let mut scores = Vec::with_capacity(keys.len());
        for (key, key_embedding) in keys.iter().zip(&embedded[1..]) {
            if key_embedding.vector.len() != query_vector.len() {
                return Err(RouterError::DimensionMismatch {
                    text: (*key).to_string(),
                    expected: query_vector.len(),
                    actual: key_embedding.vector.len(),
                });
            }
            scores.push(scaled_dot_product(query_vector, &key_embedding.vector));
        }

        Ok(KeyScores { scores, degraded })
    }

    /// Route over `options` and register a PENDING decision.
    pub async fn route(
        &self,
        request: &RouteRequest,
        options: Vec<StrategyOption>,
    ) -> Result<RoutingResult, RouterError> {
        let options = sanitize(options);
        if options.is_empty() {
            return Err(RouterError::NoCandidates);
        }

        let keys: Vec<&str> = options.iter().map(StrategyOption::key_text).collect();
        let KeyScores {
            scores,
            degraded: mut reasons,
        } = self.score_keys(&request.query, &keys).await?;

        let weights = if scores.is_empty() {
            vec![1.0 / options.len() as f64; options.len()]
        } else {
            let logits: Vec<f64> = options
                .iter()
                .zip(&scores)
                .map(|(option, score)| {
                    let reliability = option.reliability().clamp(MIN_RELIABILITY, 1.0);
                    score / self.temperature + reliability.ln()
                })
                .collect();
            softmax(&logits)
        };
        debug!(?scores, ?weights, "Computed attention weights");

        let mut selected = stable_argmax(&weights).ok_or(RouterError::NoCandidates)?;
        let mut parameter_vector = blend_parameters(&options, &weights, selected);

        if weights[selected] < self.confidence_floor {
            reasons.push(DegradedReason::LowConfidence {
                computed_id: options[selected].id.clone(),
                confidence: weights[selected],
            });
            let default = request
                .default_strategy
                .as_deref()
                .and_then(|id| options.iter().position(|o| o.id == id));
            match default {
                Some(index) => {
                    warn!(
                        computed = %options[selected].id,
                        confidence = weights[selected],
                        floor = self.confidence_floor,
                        default = %options[index].id,
                        "Confidence below floor, using default strategy"
                    );
                    selected = index;
                    parameter_vector = own_parameters(&options[index]);
                }
                None => warn!(
                    computed = %options[selected].id,
                    confidence = weights[selected],
                    "Confidence below floor and no default strategy among candidates"
                ),
            }
        }

        let attention_weights: Vec<AttentionWeight> = options
            .iter()
            .zip(&weights)
            .map(|(option, weight)| AttentionWeight {
                option_id: option.id.clone(),
                weight: *weight,
            })
            .collect();

        let extensions = options[selected].extensions.clone();
        let decision = Decision::pending(
            request.context_type.clone(),
            request.archetype.clone(),
            &request.query,
            options[selected].id.clone(),
            parameter_vector.clone(),
            attention_weights.clone(),
            request.mode,
        )
        .with_extensions(extensions.clone());
        let decision_id = self.ledger.register(decision).await;

        let status = RoutingStatus::from_reasons(reasons);
        info!(
            decision_id = %decision_id,
            selected = %options[selected].id,
            confidence = weights[selected],
            mode = %request.mode,
            degraded = status.is_degraded(),
            "Routed repair strategy"
        );

        Ok(RoutingResult {
            selected_id: options[selected].id.clone(),
            parameter_vector,
            attention_weights,
            confidence: weights[selected],
            decision_id,
            mode: request.mode,
            status,
            extensions,
        })
    }
}
