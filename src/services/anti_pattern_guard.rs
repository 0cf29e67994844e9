//! Anti-pattern guard.
//!
//! Turns a poor success record into a routing penalty. The penalty is a
//! synthesized `routing_reliability` parameter folded into the option's
//! attention logit; the option's own numeric values are never touched.
//! Failure history says a configuration is not to be trusted, not which
//! direction to move it.

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::models::{
    AntiPattern, FailureHistory, ParamValue, StrategyOption, FAILURE_REASONS_EXT,
    RELIABILITY_PARAM,
};

/// Lowest reliability from the success rate alone. Flagged options stay selectable.
pub const RELIABILITY_FLOOR: f64 = 0.3;

/// Lowest multiplier applied for recorded failures.
pub const MIN_FAILURE_MULTIPLIER: f64 = 0.5;

/// Reliability of a flagged option.
///
/// `0.3 + 0.7 * success_rate`, times `max(0.5, 1 - 0.1 * failures)` when
/// failures were recorded.
pub fn reliability(success_rate: f64, failure_count: u32) -> f64 {
    let base = 0.7_f64.mul_add(success_rate.clamp(0.0, 1.0), RELIABILITY_FLOOR);
    if failure_count == 0 {
        base
    } else {
        base * 0.1_f64
            .mul_add(-f64::from(failure_count), 1.0)
            .max(MIN_FAILURE_MULTIPLIER)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AntiPatternGuard;

impl AntiPatternGuard {
    pub fn new() -> Self {
        Self
    }

    /// Inject reliability penalties into flagged options.
    ///
    /// Options with recorded failures get their reasons attached under the
    /// `failure_reasons` extension. Never fails.
    pub fn adjust(
        &self,
        options: Vec<StrategyOption>,
        anti_patterns: &[AntiPattern],
        failure_history: &FailureHistory,
    ) -> Vec<StrategyOption> {
        let flagged: HashMap<&str, &AntiPattern> = anti_patterns
            .iter()
            .map(|a| (a.option_id.as_str(), a))
            .collect();

        options
            .into_iter()
            .map(|mut option| {
                let occurrence = failure_history.get(&option.id);

                if let Some(anti) = flagged.get(option.id.as_str()) {
                    let failures = occurrence.map_or(0, |o| o.count);
                    let value = reliability(anti.success_rate, failures);
                    debug!(
                        option_id = %option.id,
                        success_rate = anti.success_rate,
                        failures,
                        reliability = value,
                        "Penalizing anti-pattern"
                    );
                    option
                        .parameters
                        .insert(RELIABILITY_PARAM.to_string(), ParamValue::Number(value));
                }

                if let Some(occurrence) = occurrence.filter(|o| !o.reasons.is_empty()) {
                    option.extensions.insert(
                        FAILURE_REASONS_EXT.to_string(),
                        Value::from(occurrence.reasons.clone()),
                    );
                }
                option
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FailureOccurrence;

    fn anti(option_id: &str, success_rate: f64) -> AntiPattern {
        AntiPattern {
            option_id: option_id.to_string(),
            success_rate,
            sample_count: 5,
        }
    }

    #[test]
    fn test_reliability_formula() {
        assert!((reliability(0.0, 0) - 0.3).abs() < 1e-12);
        assert!((reliability(0.2, 0) - 0.44).abs() < 1e-12);
        assert!((reliability(0.2, 2) - 0.44 * 0.8).abs() < 1e-12);
        // multiplier bottoms out at one half
        assert!((reliability(0.0, 50) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_only_flagged_options_penalized() {
        let options = vec![
            StrategyOption::new("stub-fix", "stubs").with_param("max_edits", 12.0),
            StrategyOption::new("logic-fix", "logic").with_param("max_edits", 8.0),
        ];
        let mut history = FailureHistory::new();
        history.insert(
            "stub-fix".to_string(),
            FailureOccurrence {
                count: 3,
                reasons: vec!["placeholder left in place".to_string()],
            },
        );

        let adjusted = AntiPatternGuard::new().adjust(options, &[anti("stub-fix", 0.1)], &history);

        let expected = reliability(0.1, 3);
        assert_eq!(adjusted[0].number(RELIABILITY_PARAM), Some(expected));
        assert_eq!(adjusted[0].number("max_edits"), Some(12.0));
        assert_eq!(
            adjusted[0].extensions[FAILURE_REASONS_EXT],
            serde_json::json!(["placeholder left in place"])
        );
        assert!(adjusted[1].number(RELIABILITY_PARAM).is_none());
        assert!(adjusted[1].extensions.is_empty());
    }

    #[test]
    fn test_unknown_anti_pattern_ignored() {
        let options = vec![StrategyOption::new("logic-fix", "logic")];
        let adjusted =
            AntiPatternGuard::new().adjust(options.clone(), &[anti("ghost", 0.0)], &FailureHistory::new());
        assert_eq!(adjusted, options);
    }
}
