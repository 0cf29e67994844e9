//! Outcome recorder.
//!
//! Closes the learning loop: takes a PENDING decision out of the ledger,
//! buckets the reported quality, feeds the evolution store and the long-term
//! corpora, and forwards the completed decision to the sink. Bookkeeping
//! failures are logged and never change the caller's result. Unapproved
//! mutations never enter the success corpus.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::models::{
    excerpt, AntiPatternEntry, CorpusConfig, Decision, Outcome, OutcomeStatus, SuccessCase,
};
use crate::domain::ports::OutcomeCorpus;
use crate::services::decision_ledger::{DecisionLedger, LedgerTake};
use crate::services::evolution_store::EvolutionStore;

/// Characters of outcome details kept as an anti-pattern reason.
const REASON_CHARS: usize = 200;

pub struct OutcomeRecorder {
    ledger: Arc<DecisionLedger>,
    evolution: Arc<EvolutionStore>,
    corpus: Arc<dyn OutcomeCorpus>,
    success_quality_threshold: f64,
    anti_pattern_quality_threshold: f64,
}

impl OutcomeRecorder {
    pub fn new(
        ledger: Arc<DecisionLedger>,
        evolution: Arc<EvolutionStore>,
        corpus: Arc<dyn OutcomeCorpus>,
        config: &CorpusConfig,
    ) -> Self {
        Self {
            ledger,
            evolution,
            corpus,
            success_quality_threshold: config.success_quality_threshold,
            anti_pattern_quality_threshold: config.anti_pattern_quality_threshold,
        }
    }

    /// Register a PENDING decision.
    pub async fn start(&self, decision: Decision) -> String {
        self.ledger.register(decision).await
    }

    /// Complete a decision with its outcome.
    ///
    /// Returns `false` for unknown, expired or already completed ids.
    pub async fn complete(
        &self,
        decision_id: &str,
        success: bool,
        quality_score: f64,
        details: &str,
    ) -> bool {
        let mut decision = match self.ledger.take(decision_id).await {
            LedgerTake::Pending(decision) => *decision,
            LedgerTake::AlreadyCompleted => {
                warn!(decision_id, "Decision already completed, ignoring outcome");
                return false;
            }
            LedgerTake::Unknown => {
                warn!(decision_id, "Unknown or expired decision, ignoring outcome");
                return false;
            }
        };

        let outcome = Outcome::new(success, quality_score, details);
        decision.complete(outcome.clone());

        if let Err(e) = self.evolution.update(&decision, &outcome).await {
            warn!(decision_id, error = %e, "Failed to update learned record");
        }
        self.record_corpus(&decision, &outcome).await;
        self.ledger.publish_completed(&decision);

        info!(
            decision_id,
            archetype = %decision.archetype,
            option_id = %decision.selected_option,
            status = %outcome.status,
            quality_score = outcome.quality_score,
            "Decision completed"
        );
        true
    }

    async fn record_corpus(&self, decision: &Decision, outcome: &Outcome) {
        if outcome.success && outcome.quality_score >= self.success_quality_threshold {
            if !decision.learnable {
                debug!(
                    decision_id = %decision.decision_id,
                    "Unapproved mutation, keeping it out of the success corpus"
                );
                return;
            }
            let case = SuccessCase::new(
                decision.context_type.clone(),
                decision.archetype.clone(),
                decision.query_excerpt.clone(),
                decision.selected_option.clone(),
                decision.parameter_vector_used.clone(),
                outcome.quality_score,
            );
            if let Err(e) = self.corpus.record_success(&case).await {
                warn!(decision_id = %decision.decision_id, error = %e, "Failed to record success case");
            }
        } else if (!outcome.success || outcome.status == OutcomeStatus::Failure)
            && outcome.quality_score < self.anti_pattern_quality_threshold
        {
            let reason = if outcome.details.trim().is_empty() {
                format!("{} at quality {:.1}", outcome.status, outcome.quality_score)
            } else {
                excerpt(outcome.details.trim(), REASON_CHARS)
            };
            let entry = AntiPatternEntry::new(
                decision.context_type.clone(),
                decision.archetype.clone(),
                decision.selected_option.clone(),
                decision.query_excerpt.clone(),
                reason,
                outcome.quality_score,
            );
            if let Err(e) = self.corpus.record_anti_pattern(&entry).await {
                warn!(decision_id = %decision.decision_id, error = %e, "Failed to record anti-pattern");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryLearnedRecordRepository, InMemoryOutcomeCorpus};
    use crate::domain::models::{EscalationMode, EvolutionConfig, LearnedKey, ParameterVector};
    use crate::domain::ports::{LearnedRecordRepository, NullDecisionSink};
    use std::time::Duration;

    struct Harness {
        recorder: OutcomeRecorder,
        repository: Arc<InMemoryLearnedRecordRepository>,
        corpus: Arc<InMemoryOutcomeCorpus>,
    }

    fn harness() -> Harness {
        let repository = Arc::new(InMemoryLearnedRecordRepository::new());
        let corpus = Arc::new(InMemoryOutcomeCorpus::new());
        let ledger = Arc::new(DecisionLedger::new(
            Arc::new(NullDecisionSink),
            Duration::from_secs(60),
            100,
        ));
        let evolution = Arc::new(EvolutionStore::new(
            repository.clone(),
            EvolutionConfig::default(),
        ));
        let recorder = OutcomeRecorder::new(ledger, evolution, corpus.clone(), &CorpusConfig::default());
        Harness {
            recorder,
            repository,
            corpus,
        }
    }

    fn decision(mode: EscalationMode) -> Decision {
        Decision::pending(
            "repair",
            "dashboard",
            "Error: Cannot find module 'chart.js'",
            "dependency-fix",
            ParameterVector::new(),
            vec![],
            mode,
        )
    }

    #[tokio::test]
    async fn test_unknown_decision_returns_false() {
        let h = harness();
        assert!(!h.recorder.complete("unknown-id", true, 8.0, "").await);
    }

    #[tokio::test]
    async fn test_double_completion_rejected() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Standard)).await;

        assert!(h.recorder.complete(&id, true, 9.0, "fixed").await);
        assert!(!h.recorder.complete(&id, true, 9.0, "fixed").await);

        let key = LearnedKey::new("repair", "dashboard", "dependency-fix");
        let record = h.repository.get(&key).await.unwrap().unwrap();
        assert_eq!(record.sample_count, 1);
    }

    #[tokio::test]
    async fn test_high_quality_success_enters_corpus() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Standard)).await;
        assert!(h.recorder.complete(&id, true, 8.5, "").await);

        assert_eq!(h.corpus.success_count().await, 1);
        assert_eq!(h.corpus.anti_pattern_count().await, 0);
    }

    #[tokio::test]
    async fn test_partial_success_stays_out_of_corpora() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Standard)).await;
        assert!(h.recorder.complete(&id, true, 5.0, "").await);

        assert_eq!(h.corpus.success_count().await, 0);
        assert_eq!(h.corpus.anti_pattern_count().await, 0);
    }

    #[tokio::test]
    async fn test_low_quality_failure_enters_anti_pattern_corpus() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Standard)).await;
        assert!(h.recorder.complete(&id, false, 1.0, "  still failing to resolve  ").await);

        let history = h.corpus.failure_history("repair", "dashboard").await.unwrap();
        assert_eq!(history["dependency-fix"].reasons, vec!["still failing to resolve"]);
    }

    #[tokio::test]
    async fn test_transformational_outcome_not_learned() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Transformational)).await;
        assert!(h.recorder.complete(&id, true, 9.0, "").await);

        assert!(h.repository.is_empty().await);
        assert_eq!(h.corpus.success_count().await, 0);
    }

    #[tokio::test]
    async fn test_transformational_failure_still_recorded_as_anti_pattern() {
        let h = harness();
        let id = h.recorder.start(decision(EscalationMode::Transformational)).await;
        assert!(h.recorder.complete(&id, false, 0.5, "mutation broke the build").await);

        assert!(h.repository.is_empty().await);
        assert_eq!(h.corpus.anti_pattern_count().await, 1);
    }
}
