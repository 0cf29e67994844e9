//! Cross-archetype search for exploratory mode.
//!
//! Finds errors solved under other archetypes that resemble the current one,
//! scoring corpus excerpts with the router's own embed-and-score primitive.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::models::{numeric_entries, EscalationConfig, ParamValue, ParameterVector, SuccessCase};
use crate::domain::ports::OutcomeCorpus;
use crate::services::attention_router::AttentionRouter;

/// A solved case and its scaled similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossArchetypeMatch {
    pub case: SuccessCase,
    pub score: f64,
}

pub struct CrossArchetypeSearch {
    corpus: Arc<dyn OutcomeCorpus>,
    router: Arc<AttentionRouter>,
    max_results: usize,
    min_score: f64,
    corpus_limit: usize,
}

impl CrossArchetypeSearch {
    pub fn new(
        corpus: Arc<dyn OutcomeCorpus>,
        router: Arc<AttentionRouter>,
        config: &EscalationConfig,
    ) -> Self {
        Self {
            corpus,
            router,
            max_results: config.exploratory_max_results,
            min_score: config.exploratory_min_score,
            corpus_limit: config.exploratory_corpus_limit,
        }
    }

    /// Best match per other archetype, highest score first, at most `max_results`.
    ///
    /// Cases solved with a strategy in `excluded` are skipped. Every failure
    /// path yields an empty list.
    pub async fn search(
        &self,
        context_type: &str,
        archetype: &str,
        error_text: &str,
        excluded: &HashSet<&str>,
    ) -> Vec<CrossArchetypeMatch> {
        let cases = match self
            .corpus
            .solved_cases_excluding(context_type, archetype, self.corpus_limit)
            .await
        {
            Ok(cases) => cases,
            Err(e) => {
                warn!(error = %e, "Cross-archetype corpus lookup failed");
                return Vec::new();
            }
        };
        let cases: Vec<SuccessCase> = cases
            .into_iter()
            .filter(|case| !excluded.contains(case.strategy_id.as_str()))
            .collect();
        if cases.is_empty() {
            return Vec::new();
        }

        let keys: Vec<&str> = cases.iter().map(|c| c.error_excerpt.as_str()).collect();
        let scores = match self.router.score_keys(error_text, &keys).await {
            Ok(scored) if !scored.scores.is_empty() => scored.scores,
            Ok(_) => {
                warn!("Cross-archetype scoring timed out");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Cross-archetype scoring failed");
                return Vec::new();
            }
        };

        let mut best: HashMap<String, CrossArchetypeMatch> = HashMap::new();
        for (case, score) in cases.into_iter().zip(scores) {
            if score <= self.min_score || case.archetype == archetype {
                continue;
            }
            match best.get(&case.archetype) {
                Some(existing) if existing.score >= score => {}
                _ => {
                    best.insert(case.archetype.clone(), CrossArchetypeMatch { case, score });
                }
            }
        }

        let mut matches: Vec<CrossArchetypeMatch> = best.into_values().collect();
        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.case.archetype.cmp(&b.case.archetype))
        });
        matches.truncate(self.max_results);

        debug!(
            matches = matches.len(),
            archetypes = ?matches.iter().map(|m| m.case.archetype.as_str()).collect::<Vec<_>>(),
            "Cross-archetype search complete"
        );
        matches
    }
}

/// Average a base vector with borrowed solutions.
///
/// Each numeric key of `base` becomes the mean over `base` and every
/// borrowed vector defining it numerically. Non-numeric values and the key
/// set stay those of `base`.
pub fn average_parameters<'a>(
    base: &ParameterVector,
    borrowed: impl IntoIterator<Item = &'a ParameterVector>,
) -> ParameterVector {
    let mut sums: HashMap<&str, (f64, usize)> = numeric_entries(base)
        .map(|(key, value)| (key.as_str(), (value, 1)))
        .collect();

    for params in borrowed {
        for (key, value) in numeric_entries(params) {
            if let Some((sum, count)) = sums.get_mut(key.as_str()) {
                *sum += value;
                *count += 1;
            }
        }
    }

    base.iter()
        .map(|(key, value)| {
            let averaged = sums
                .get(key.as_str())
                .map_or_else(|| value.clone(), |(sum, count)| ParamValue::Number(sum / *count as f64));
            (key.clone(), averaged)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_keeps_base_shape() {
        let mut base = ParameterVector::new();
        base.insert("max_edits".into(), 4.0.into());
        base.insert("verify_after_fix".into(), true.into());

        let mut a = ParameterVector::new();
        a.insert("max_edits".into(), 8.0.into());
        a.insert("verify_after_fix".into(), false.into());
        a.insert("extra".into(), 1.0.into());
        let mut b = ParameterVector::new();
        b.insert("max_edits".into(), 12.0.into());

        let averaged = average_parameters(&base, [&a, &b]);

        assert_eq!(averaged["max_edits"], ParamValue::Number(8.0));
        assert_eq!(averaged["verify_after_fix"], ParamValue::Bool(true));
        assert!(!averaged.contains_key("extra"));
    }

    #[test]
    fn test_average_with_nothing_borrowed_is_identity() {
        let mut base = ParameterVector::new();
        base.insert("token_budget".into(), 3000.0.into());
        assert_eq!(average_parameters(&base, []), base);
    }
}
