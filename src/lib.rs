//! Remedy - self-evolving repair strategy engine
//!
//! Remedy decides how to repair a failed generated artifact. Candidate
//! strategies are scored against the error text with scaled dot-product
//! attention, biased by parameters learned from past outcomes, and escalated
//! through exploratory and transformational modes as retries accumulate,
//! all within a hard per-session budget.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, ports and errors
//! - **Service Layer** (`services`): Routing, learning, escalation and budgets
//! - **Adapters** (`adapters`): SQLite and in-memory stores, embedding providers
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use remedy::{Config, RepairEngine, RepairRequest};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let engine = RepairEngine::from_config(Config::default()).await?;
//! let session = engine.start_session("project-42");
//!
//! let result = engine
//!     .decide(&session, RepairRequest::new("Cannot find module 'chart.js'", "dashboard", 0))
//!     .await?;
//!
//! // ... apply the repair, then report how it went
//! engine.complete(&result.decision_id, true, 8.5, "build passes").await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Decision, EscalationMode, EscalationResult, LearnedRecord, MutationRecord, Outcome,
    ParamValue, ParameterVector, RoutingResult, StrategyOption,
};
pub use domain::ports::{DecisionSink, EmbeddingProvider, LearnedRecordRepository, OutcomeCorpus};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AttentionRouter, BudgetRegistry, EngineError, EscalationController, EvolutionStore,
    HealingBudget, OutcomeRecorder, RepairEngine, RepairRequest, RepairSession,
};
