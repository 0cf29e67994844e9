//! Service layer: routing, learning, escalation and budget coordination.

pub mod anti_pattern_guard;
pub mod attention_router;
pub mod cross_archetype;
pub mod decision_ledger;
pub mod embedding_cache;
pub mod escalation_controller;
pub mod evolution_store;
pub mod healing_budget;
pub mod mutation;
pub mod outcome_recorder;
pub mod repair_engine;
pub mod strategy_catalog;

pub use anti_pattern_guard::AntiPatternGuard;
pub use attention_router::{
    blend_parameters, scaled_dot_product, softmax, AttentionRouter, RouteRequest, RouterError,
};
pub use cross_archetype::{average_parameters, CrossArchetypeMatch, CrossArchetypeSearch};
pub use decision_ledger::{DecisionLedger, LedgerTake};
pub use embedding_cache::{Embedded, EmbeddingBatch, EmbeddingCache};
pub use escalation_controller::{EngineError, EscalationController, RepairRequest};
pub use evolution_store::EvolutionStore;
pub use healing_budget::{BudgetError, BudgetRegistry, HealingBudget, RepairSession};
pub use outcome_recorder::OutcomeRecorder;
pub use repair_engine::RepairEngine;
pub use strategy_catalog::{canonical_strategies, StrategyCatalog, DEFAULT_STRATEGY_ID};
