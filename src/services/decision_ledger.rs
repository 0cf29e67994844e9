//! Bounded ledger of PENDING decisions.
//!
//! Decisions wait here between routing and outcome. Entries expire after a
//! TTL so abandoned sessions cannot grow the ledger without bound; an
//! expired decision simply never completes.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::models::{Decision, DecisionsConfig, ParameterVector};
use crate::domain::ports::DecisionSink;

/// How long completed ids are remembered for diagnostics.
const COMPLETED_ID_TTL_SECS: u64 = 3600;

/// Outcome of taking a decision out of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerTake {
    Pending(Box<Decision>),
    AlreadyCompleted,
    Unknown,
}

pub struct DecisionLedger {
    pending: Cache<String, Decision>,
    completed: Cache<String, ()>,
    sink: Arc<dyn DecisionSink>,
}

impl DecisionLedger {
    pub fn new(sink: Arc<dyn DecisionSink>, pending_ttl: Duration, max_pending: u64) -> Self {
        let pending = Cache::builder()
            .max_capacity(max_pending)
            .time_to_live(pending_ttl)
            .build();
        let completed = Cache::builder()
            .max_capacity(max_pending)
            .time_to_live(Duration::from_secs(COMPLETED_ID_TTL_SECS))
            .build();

        Self {
            pending,
            completed,
            sink,
        }
    }

    pub fn from_config(sink: Arc<dyn DecisionSink>, config: &DecisionsConfig) -> Self {
        Self::new(
            sink,
            Duration::from_secs(config.pending_ttl_secs),
            config.max_pending,
        )
    }

    /// Register a PENDING decision and forward it to the sink.
    pub async fn register(&self, decision: Decision) -> String {
        let decision_id = decision.decision_id.clone();
        self.sink.decision_started(&decision);
        self.pending.insert(decision_id.clone(), decision).await;
        debug!(decision_id = %decision_id, "Registered pending decision");
        decision_id
    }

    pub async fn get(&self, decision_id: &str) -> Option<Decision> {
        self.pending.get(decision_id).await
    }

    /// Replace the parameter vector recorded on a pending decision.
    pub async fn amend_parameters(&self, decision_id: &str, parameters: ParameterVector) -> bool {
        let Some(mut decision) = self.pending.get(decision_id).await else {
            return false;
        };
        decision.parameter_vector_used = parameters;
        self.pending.insert(decision_id.to_string(), decision).await;
        true
    }

    /// Remove a pending decision for completion.
    ///
    /// Removal is atomic, so of two concurrent completions only one gets
    /// [`LedgerTake::Pending`].
    pub async fn take(&self, decision_id: &str) -> LedgerTake {
        if let Some(decision) = self.pending.remove(decision_id).await {
            self.completed.insert(decision_id.to_string(), ()).await;
            return LedgerTake::Pending(Box::new(decision));
        }
        if self.completed.contains_key(decision_id) {
            LedgerTake::AlreadyCompleted
        } else {
            LedgerTake::Unknown
        }
    }

    /// Forward a completed decision to the sink.
    pub fn publish_completed(&self, decision: &Decision) {
        self.sink.decision_completed(decision);
    }

    pub async fn pending_count(&self) -> u64 {
        self.pending.run_pending_tasks().await;
        self.pending.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EscalationMode;
    use crate::domain::ports::NullDecisionSink;

    fn decision() -> Decision {
        Decision::pending(
            "repair",
            "dashboard",
            "SyntaxError: unexpected token",
            "syntax-fix",
            ParameterVector::new(),
            vec![],
            EscalationMode::Standard,
        )
    }

    fn ledger(ttl: Duration) -> DecisionLedger {
        DecisionLedger::new(Arc::new(NullDecisionSink), ttl, 100)
    }

    #[tokio::test]
    async fn test_take_once() {
        let ledger = ledger(Duration::from_secs(60));
        let id = ledger.register(decision()).await;

        assert!(matches!(ledger.take(&id).await, LedgerTake::Pending(_)));
        assert_eq!(ledger.take(&id).await, LedgerTake::AlreadyCompleted);
        assert_eq!(ledger.take("unknown-id").await, LedgerTake::Unknown);
    }

    #[tokio::test]
    async fn test_amend_parameters() {
        let ledger = ledger(Duration::from_secs(60));
        let id = ledger.register(decision()).await;

        let mut params = ParameterVector::new();
        params.insert("max_edits".into(), 4.0.into());
        assert!(ledger.amend_parameters(&id, params.clone()).await);
        assert!(!ledger.amend_parameters("unknown-id", params.clone()).await);

        assert_eq!(ledger.get(&id).await.unwrap().parameter_vector_used, params);
    }

    #[tokio::test]
    async fn test_pending_entries_expire() {
        let ledger = ledger(Duration::from_millis(50));
        let id = ledger.register(decision()).await;
        assert_eq!(ledger.pending_count().await, 1);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(ledger.take(&id).await, LedgerTake::Unknown);
        assert_eq!(ledger.pending_count().await, 0);
    }
}
