//! Property tests for routing math, budgets, escalation and learning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use remedy::domain::models::{
    fallback_embedding, BudgetLimits, EscalationMode, LearnedKey, LearnedRecord, ParamValue,
    ParameterVector, RouterConfig, StrategyOption,
};
use remedy::domain::ports::{EmbeddingProvider, NullDecisionSink};
use remedy::services::{
    blend_parameters, softmax, AttentionRouter, DecisionLedger, EmbeddingCache, HealingBudget,
    RouteRequest,
};
use remedy::{DomainError, DomainResult};

proptest! {
    /// Property: softmax weights are non-negative and sum to 1
    #[test]
    fn prop_softmax_normalizes(logits in prop::collection::vec(-50.0f64..50.0, 1..16)) {
        let weights = softmax(&logits);

        prop_assert_eq!(weights.len(), logits.len());
        prop_assert!(weights.iter().all(|w| *w >= 0.0));
        let sum: f64 = weights.iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum was {}", sum);
    }

    /// Property: softmax preserves logit order
    #[test]
    fn prop_softmax_monotone(logits in prop::collection::vec(-20.0f64..20.0, 2..10)) {
        let weights = softmax(&logits);
        for i in 0..logits.len() {
            for j in 0..logits.len() {
                if logits[i] > logits[j] {
                    prop_assert!(weights[i] >= weights[j]);
                }
            }
        }
    }

    /// Property: fallback embeddings are deterministic and unit length
    #[test]
    fn prop_fallback_embedding_deterministic(text in ".{0,200}", dimension in 1usize..256) {
        let first = fallback_embedding(&text, dimension);
        let second = fallback_embedding(&text, dimension);

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.len(), dimension);
        let norm: f64 = first.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt();
        prop_assert!((norm - 1.0).abs() < 1e-3, "norm was {}", norm);
    }

    /// Property: a budget never grants more than its limit
    #[test]
    fn prop_budget_never_exceeds_max(max in 0u32..20, attempts in 0usize..60) {
        let budget = HealingBudget::new(
            BudgetLimits { llm_calls: max, critical_regens: 2, docker_restarts: 3 },
            10,
        );

        let granted = (0..attempts).filter(|_| budget.use_llm_call()).count();

        prop_assert_eq!(granted, attempts.min(max as usize));
        prop_assert_eq!(budget.llm_calls_remaining(), max.saturating_sub(attempts as u32));
        prop_assert!(budget.audit_log().len() <= 10);
    }

    /// Property: escalation mode never decreases as retries grow
    #[test]
    fn prop_mode_monotone(explore in 0u32..10, gap in 0u32..10, retries in 0u32..40) {
        let transform = explore + gap;
        let now = EscalationMode::for_retries(retries, explore, transform);
        let next = EscalationMode::for_retries(retries + 1, explore, transform);

        prop_assert!(next >= now);
        if retries >= transform {
            prop_assert_eq!(now, EscalationMode::Transformational);
        }
    }

    /// Property: folding outcomes matches the closed-form EMA recurrence
    #[test]
    fn prop_ema_fold_matches_reference(
        alpha in 0.01f64..=1.0,
        observations in prop::collection::vec((0.0f64..=1.0, 0.0f64..100.0), 1..30),
    ) {
        let mut record = LearnedRecord::empty(LearnedKey::new("repair", "prop", "logic-fix"));
        let mut expected_rate = 0.0;
        let mut expected_ema = 0.0;

        for (i, (signal, value)) in observations.iter().enumerate() {
            let mut params = ParameterVector::new();
            params.insert("max_edits".to_string(), ParamValue::Number(*value));
            record.observe(alpha, *signal, Some(&params), 5.0);

            if i == 0 {
                expected_rate = *signal;
                expected_ema = *value;
            } else {
                expected_rate = alpha * signal + (1.0 - alpha) * expected_rate;
                expected_ema = alpha * value + (1.0 - alpha) * expected_ema;
            }
        }

        prop_assert_eq!(record.sample_count, observations.len() as u64);
        prop_assert!((record.success_rate - expected_rate).abs() < 1e-9);
        prop_assert!((record.ema_values["max_edits"] - expected_ema).abs() < 1e-6);
        prop_assert!(record.confidence > 0.0 && record.confidence < 1.0);
    }

    /// Property: blended numeric values stay within the options' range
    #[test]
    fn prop_blend_is_convex(
        values in prop::collection::vec(0.0f64..1000.0, 2..8),
        logits in prop::collection::vec(-5.0f64..5.0, 8),
    ) {
        let options: Vec<StrategyOption> = values
            .iter()
            .enumerate()
            .map(|(i, v)| StrategyOption::new(format!("opt-{i}"), "option").with_param("speed", *v))
            .collect();
        let weights = softmax(&logits[..options.len()]);

        let blended = blend_parameters(&options, &weights, 0);
        let speed = blended["speed"].as_number().unwrap();

        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(speed >= lo - 1e-6 && speed <= hi + 1e-6);
    }
}

const KEYS: usize = 4;

/// Provider with a fixed text-to-vector table.
struct TableProvider {
    table: HashMap<String, Vec<f32>>,
    dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for TableProvider {
    fn name(&self) -> &'static str {
        "table"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| DomainError::EmbeddingFailed(format!("no vector for {text}")))
    }
}

/// Weight of the key equal to the query, all other keys orthogonal to it.
///
/// Key `i` is non-zero only on its own block of `dimension / KEYS`
/// coordinates, each set to `component`.
async fn matching_weight(dimension: usize, component: f32, temperature: f64) -> f64 {
    let block = dimension / KEYS;
    let mut table = HashMap::new();
    for i in 0..KEYS {
        let mut vector = vec![0.0f32; dimension];
        vector[i * block..(i + 1) * block].fill(component);
        if i == 0 {
            table.insert("query".to_string(), vector.clone());
        }
        table.insert(format!("key {i}"), vector);
    }

    let cache = Arc::new(EmbeddingCache::with_settings(
        Arc::new(TableProvider { table, dimension }),
        100,
        Duration::from_secs(60),
        Duration::from_secs(5),
        dimension,
    ));
    let ledger = Arc::new(DecisionLedger::new(
        Arc::new(NullDecisionSink),
        Duration::from_secs(60),
        100,
    ));
    let config = RouterConfig {
        temperature,
        confidence_floor: 0.0,
        ..RouterConfig::default()
    };
    let router = AttentionRouter::new(cache, ledger, &config);

    let options = (0..KEYS)
        .map(|i| StrategyOption::new(format!("k{i}"), format!("key {i}")))
        .collect();
    let result = router
        .route(&RouteRequest::new("query", "repair", "dashboard"), options)
        .await
        .unwrap();

    assert_eq!(result.selected_id, "k0");
    assert!(!result.status.is_degraded());
    result.confidence
}

const DIMENSIONS: [usize; 5] = [8, 32, 128, 512, 2048];

#[tokio::test]
async fn test_matching_key_weight_grows_with_dimension() {
    // Unit-scale components: dot(Q, K) grows like d, the scaled score like sqrt(d).
    let mut previous = 0.0;
    for dimension in DIMENSIONS {
        let weight = matching_weight(dimension, 1.0, 1.0).await;
        let logit = (dimension as f64).sqrt() / KEYS as f64;
        let expected = logit.exp() / (logit.exp() + (KEYS - 1) as f64);

        assert!((weight - expected).abs() < 1e-9, "d={dimension}: {weight} vs {expected}");
        assert!(weight > previous, "d={dimension}: {weight} <= {previous}");
        previous = weight;
    }
    assert!(previous > 0.9999, "weight at d=2048 was {previous}");
}

#[tokio::test]
async fn test_unit_norm_keys_flatten_with_dimension() {
    // Unit-norm vectors have dot(Q, K) = 1 at every d, so the scaled score
    // shrinks like 1/sqrt(d) and weights drift toward uniform. The matching
    // key still wins, and the default temperature keeps it well clear of 1/KEYS.
    let mut previous = 1.0;
    for dimension in DIMENSIONS {
        let component = 1.0 / ((dimension / KEYS) as f32).sqrt();
        let weight = matching_weight(dimension, component, RouterConfig::default().temperature).await;

        assert!(weight < previous, "d={dimension}: {weight} >= {previous}");
        assert!(weight > 1.0 / KEYS as f64, "d={dimension}: {weight}");
        previous = weight;
    }
}

