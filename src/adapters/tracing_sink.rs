//! Decision sink that emits structured tracing events.

use tracing::info;

use crate::domain::models::Decision;
use crate::domain::ports::DecisionSink;

/// Forwards decisions and outcomes as events on target `remedy::decisions`.
///
/// Pair with a JSON subscriber layer to get an append-only decision log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDecisionSink;

impl DecisionSink for TracingDecisionSink {
    fn decision_started(&self, decision: &Decision) {
        let weights = serde_json::to_string(&decision.attention_weights).unwrap_or_default();
        let extensions = serde_json::to_string(&decision.extensions).unwrap_or_default();
        info!(
            target: "remedy::decisions",
            event = "decision_started",
            decision_id = %decision.decision_id,
            context_type = %decision.context_type,
            archetype = %decision.archetype,
            mode = %decision.mode,
            selected_option = %decision.selected_option,
            learnable = decision.learnable,
            attention_weights = %weights,
            extensions = %extensions,
            query = %decision.query_excerpt,
        );
    }

    fn decision_completed(&self, decision: &Decision) {
        let Some(outcome) = &decision.outcome else {
            return;
        };
        info!(
            target: "remedy::decisions",
            event = "decision_completed",
            decision_id = %decision.decision_id,
            archetype = %decision.archetype,
            selected_option = %decision.selected_option,
            status = %outcome.status,
            success = outcome.success,
            quality_score = outcome.quality_score,
            latency_ms = (outcome.completed_at - decision.created_at).num_milliseconds(),
        );
    }
}
