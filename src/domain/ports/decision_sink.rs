//! Observability sink port for decisions and outcomes.
//!
//! The engine only produces well-formed, uniquely identified records; what
//! the sink does with them (append-only telemetry, analytics) is outside the
//! engine and never read back.

use crate::domain::models::Decision;

pub trait DecisionSink: Send + Sync {
    /// A decision was registered as PENDING.
    fn decision_started(&self, decision: &Decision);

    /// A decision received its outcome.
    fn decision_completed(&self, decision: &Decision);
}

/// A sink that drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDecisionSink;

impl DecisionSink for NullDecisionSink {
    fn decision_started(&self, _decision: &Decision) {}

    fn decision_completed(&self, _decision: &Decision) {}
}
