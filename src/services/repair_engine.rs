//! Repair engine facade.
//!
//! Wires the routing, learning, escalation and budget services from a
//! [`Config`] and injected ports, and exposes the session lifecycle the
//! enclosing pipeline drives: start a session, ask for decisions, report
//! outcomes, end the session.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::adapters::embeddings::{HashEmbeddingProvider, OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};
use crate::adapters::memory::{InMemoryLearnedRecordRepository, InMemoryOutcomeCorpus};
use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteLearnedRecordRepository,
    SqliteOutcomeCorpus,
};
use crate::adapters::TracingDecisionSink;
use crate::domain::models::{Config, EscalationMode, EscalationResult};
use crate::domain::ports::{DecisionSink, EmbeddingProvider, LearnedRecordRepository, OutcomeCorpus};
use crate::services::attention_router::AttentionRouter;
use crate::services::decision_ledger::DecisionLedger;
use crate::services::embedding_cache::EmbeddingCache;
use crate::services::escalation_controller::{EngineError, EscalationController, RepairRequest};
use crate::services::evolution_store::EvolutionStore;
use crate::services::healing_budget::{BudgetRegistry, RepairSession};
use crate::services::outcome_recorder::OutcomeRecorder;
use crate::services::strategy_catalog::StrategyCatalog;

pub struct RepairEngine {
    config: Config,
    controller: EscalationController,
    recorder: OutcomeRecorder,
    evolution: Arc<EvolutionStore>,
    ledger: Arc<DecisionLedger>,
    budgets: BudgetRegistry,
}

impl RepairEngine {
    /// Build the engine over explicit ports.
    pub fn with_ports(
        config: Config,
        provider: Arc<dyn EmbeddingProvider>,
        repository: Arc<dyn LearnedRecordRepository>,
        corpus: Arc<dyn OutcomeCorpus>,
        sink: Arc<dyn DecisionSink>,
    ) -> Self {
        let embeddings = Arc::new(EmbeddingCache::new(provider, &config.embedding));
        let ledger = Arc::new(DecisionLedger::from_config(sink, &config.decisions));
        let router = Arc::new(AttentionRouter::new(
            embeddings,
            Arc::clone(&ledger),
            &config.router,
        ));
        let evolution = Arc::new(EvolutionStore::new(repository, config.evolution.clone()));
        let controller = EscalationController::new(
            config.context_type.clone(),
            StrategyCatalog::canonical(),
            Arc::clone(&evolution),
            router,
            Arc::clone(&corpus),
            Arc::clone(&ledger),
            config.escalation.clone(),
        );
        let recorder = OutcomeRecorder::new(
            Arc::clone(&ledger),
            Arc::clone(&evolution),
            corpus,
            &config.corpus,
        );
        let budgets = BudgetRegistry::from_config(&config.budget);

        Self {
            config,
            controller,
            recorder,
            evolution,
            ledger,
            budgets,
        }
    }

    /// SQLite persistence and the configured embedding provider.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let pool = initialize_database(
            &database_url(&config.database.path),
            Some(PoolConfig::from(&config.database)),
        )
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let provider: Arc<dyn EmbeddingProvider> = match config.embedding.provider.as_str() {
            "hash" => Arc::new(HashEmbeddingProvider::new(config.embedding.fallback_dimension)),
            _ => Arc::new(
                OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig::from(&config.embedding))
                    .context("Failed to build embedding provider")?,
            ),
        };
        info!(
            provider = provider.name(),
            database = %config.database.path,
            "Initialized repair engine"
        );

        Ok(Self::with_ports(
            config,
            provider,
            Arc::new(SqliteLearnedRecordRepository::new(pool.clone())),
            Arc::new(SqliteOutcomeCorpus::new(pool)),
            Arc::new(TracingDecisionSink),
        ))
    }

    /// Process-local stack with hash embeddings, for tests and dry runs.
    pub fn in_memory(config: Config) -> Self {
        let provider = Arc::new(HashEmbeddingProvider::new(config.embedding.fallback_dimension));
        Self::with_ports(
            config,
            provider,
            Arc::new(InMemoryLearnedRecordRepository::new()),
            Arc::new(InMemoryOutcomeCorpus::new()),
            Arc::new(TracingDecisionSink),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start (or restart) a session with a fresh budget.
    pub fn start_session(&self, session_id: &str) -> RepairSession {
        self.budgets.start_session(session_id)
    }

    pub fn session(&self, session_id: &str) -> Option<RepairSession> {
        self.budgets.get(session_id)
    }

    pub fn end_session(&self, session_id: &str) -> bool {
        self.budgets.end_session(session_id)
    }

    pub fn budgets(&self) -> &BudgetRegistry {
        &self.budgets
    }

    pub fn mode_for(&self, retries: u32) -> EscalationMode {
        self.controller.mode_for(retries)
    }

    /// Decide how to repair one failure.
    pub async fn decide(
        &self,
        session: &RepairSession,
        request: RepairRequest,
    ) -> Result<EscalationResult, EngineError> {
        self.controller.escalate(&session.budget, &request).await
    }

    /// Report the outcome of a decision. `false` for unknown or completed ids.
    pub async fn complete(
        &self,
        decision_id: &str,
        success: bool,
        quality_score: f64,
        details: &str,
    ) -> bool {
        self.recorder
            .complete(decision_id, success, quality_score, details)
            .await
    }

    pub fn evolution(&self) -> &EvolutionStore {
        &self.evolution
    }

    pub async fn pending_decisions(&self) -> u64 {
        self.ledger.pending_count().await
    }
}
