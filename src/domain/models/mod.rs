//! Domain models for the repair-strategy engine.

pub mod budget;
pub mod config;
pub mod decision;
pub mod embedding;
pub mod escalation;
pub mod learned;
pub mod routing;
pub mod strategy;

pub use budget::{AuditEntry, BudgetLimits, BudgetResource, CounterSnapshot};
pub use config::{
    BudgetConfig, Config, CorpusConfig, DatabaseConfig, DecisionsConfig, EmbeddingConfig,
    EscalationConfig, EvolutionConfig, LoggingConfig, RouterConfig,
};
pub use decision::{excerpt, Decision, DecisionStatus, Outcome, OutcomeStatus};
pub use embedding::{content_key, dot, fallback_embedding, normalize};
pub use escalation::{
    ApprovalState, EscalationMode, EscalationResult, MutationError, MutationOperator,
    MutationRecord,
};
pub use learned::{
    confidence_weight, AntiPattern, AntiPatternEntry, FailureHistory, FailureOccurrence,
    LearnedKey, LearnedRecord, SuccessCase,
};
pub use routing::{AttentionWeight, DegradedReason, RoutingResult, RoutingStatus};
pub use strategy::{
    numeric_entries, EvolvedOption, ParamValue, ParameterVector, StrategyOption,
    FAILURE_REASONS_EXT, RELIABILITY_PARAM,
};
