use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AntiPatternEntry, FailureHistory, SuccessCase};
use crate::domain::ports::OutcomeCorpus;

const MAX_REASONS_PER_OPTION: usize = 5;

/// Append-only corpora held in vectors behind async locks.
#[derive(Debug, Default)]
pub struct InMemoryOutcomeCorpus {
    successes: RwLock<Vec<SuccessCase>>,
    anti_patterns: RwLock<Vec<AntiPatternEntry>>,
}

impl InMemoryOutcomeCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn success_count(&self) -> usize {
        self.successes.read().await.len()
    }

    pub async fn anti_pattern_count(&self) -> usize {
        self.anti_patterns.read().await.len()
    }
}

#[async_trait]
impl OutcomeCorpus for InMemoryOutcomeCorpus {
    async fn record_success(&self, case: &SuccessCase) -> DomainResult<()> {
        self.successes.write().await.push(case.clone());
        Ok(())
    }

    async fn record_anti_pattern(&self, entry: &AntiPatternEntry) -> DomainResult<()> {
        self.anti_patterns.write().await.push(entry.clone());
        Ok(())
    }

    async fn solved_cases_excluding(
        &self,
        context_type: &str,
        excluded_archetype: &str,
        limit: usize,
    ) -> DomainResult<Vec<SuccessCase>> {
        Ok(self
            .successes
            .read()
            .await
            .iter()
            .rev()
            .filter(|c| c.context_type == context_type && c.archetype != excluded_archetype)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn failure_history(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<FailureHistory> {
        let mut history = FailureHistory::new();
        for entry in self
            .anti_patterns
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| e.context_type == context_type && e.archetype == archetype)
        {
            let occurrence = history.entry(entry.option_id.clone()).or_default();
            occurrence.count += 1;
            if occurrence.reasons.len() < MAX_REASONS_PER_OPTION && !entry.reason.is_empty() {
                occurrence.reasons.push(entry.reason.clone());
            }
        }
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ParameterVector;

    #[tokio::test]
    async fn test_solved_cases_exclude_archetype() {
        let corpus = InMemoryOutcomeCorpus::new();
        for archetype in ["dashboard", "storefront", "blog"] {
            corpus
                .record_success(&SuccessCase::new(
                    "repair",
                    archetype,
                    "ImportError",
                    "dependency-fix",
                    ParameterVector::new(),
                    9.0,
                ))
                .await
                .unwrap();
        }

        let cases = corpus.solved_cases_excluding("repair", "dashboard", 10).await.unwrap();
        assert_eq!(cases.len(), 2);
        assert!(cases.iter().all(|c| c.archetype != "dashboard"));
        // most recent first
        assert_eq!(cases[0].archetype, "blog");
    }

    #[tokio::test]
    async fn test_failure_history_counts() {
        let corpus = InMemoryOutcomeCorpus::new();
        for reason in ["tests failed", "lint failed", ""] {
            corpus
                .record_anti_pattern(&AntiPatternEntry::new(
                    "repair", "dashboard", "stub-fix", "err", reason, 1.0,
                ))
                .await
                .unwrap();
        }

        let history = corpus.failure_history("repair", "dashboard").await.unwrap();
        let occurrence = &history["stub-fix"];
        assert_eq!(occurrence.count, 3);
        assert_eq!(occurrence.reasons, vec!["lint failed", "tests failed"]);
        assert!(corpus.failure_history("repair", "blog").await.unwrap().is_empty());
    }
}
