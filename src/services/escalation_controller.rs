//! Escalation controller.
//!
//! Picks a mode from the retry count and runs it:
//!
//! - standard: evolve the catalog, penalize anti-patterns, route by attention
//! - exploratory: standard, then average in solutions borrowed from other archetypes
//! - transformational: mutate the current parameters behind a sandbox and approval gate
//!
//! The controller keeps no session state; the mode is a pure function of
//! `retries`. The session's budget is checked before any mode runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Decision, EscalationConfig, EscalationMode, EscalationResult, EvolvedOption, FailureHistory,
    ParameterVector, RoutingResult, RoutingStatus,
};
use crate::domain::ports::OutcomeCorpus;
use crate::services::anti_pattern_guard::AntiPatternGuard;
use crate::services::attention_router::{AttentionRouter, RouteRequest, RouterError};
use crate::services::cross_archetype::{average_parameters, CrossArchetypeSearch};
use crate::services::decision_ledger::DecisionLedger;
use crate::services::evolution_store::EvolutionStore;
use crate::services::healing_budget::{BudgetError, HealingBudget};
use crate::services::mutation;
use crate::services::strategy_catalog::StrategyCatalog;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Hard stop: the caller must cease retrying and report an honest failure.
    #[error("Healing budget exhausted\n{diagnostic}")]
    BudgetExhausted { diagnostic: String },

    #[error("Routing failed: {0}")]
    Routing(#[from] RouterError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<BudgetError> for EngineError {
    fn from(err: BudgetError) -> Self {
        match err {
            BudgetError::Exhausted { diagnostic } => Self::BudgetExhausted { diagnostic },
        }
    }
}

/// One repair decision request.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairRequest {
    pub error_text: String,
    pub archetype: String,
    pub retries: u32,
    /// Strategy being retried, if any.
    pub current_strategy: Option<String>,
    /// Parameters in use, mutated in transformational mode.
    pub current_parameters: Option<ParameterVector>,
}

impl RepairRequest {
    pub fn new(error_text: impl Into<String>, archetype: impl Into<String>, retries: u32) -> Self {
        Self {
            error_text: error_text.into(),
            archetype: archetype.into(),
            retries,
            current_strategy: None,
            current_parameters: None,
        }
    }

    #[must_use]
    pub fn with_current(mut self, strategy: impl Into<String>, parameters: ParameterVector) -> Self {
        self.current_strategy = Some(strategy.into());
        self.current_parameters = Some(parameters);
        self
    }
}

pub struct EscalationController {
    context_type: String,
    catalog: StrategyCatalog,
    evolution: Arc<EvolutionStore>,
    guard: AntiPatternGuard,
    router: Arc<AttentionRouter>,
    search: CrossArchetypeSearch,
    corpus: Arc<dyn OutcomeCorpus>,
    ledger: Arc<DecisionLedger>,
    config: EscalationConfig,
}

impl EscalationController {
    pub fn new(
        context_type: impl Into<String>,
        catalog: StrategyCatalog,
        evolution: Arc<EvolutionStore>,
        router: Arc<AttentionRouter>,
        corpus: Arc<dyn OutcomeCorpus>,
        ledger: Arc<DecisionLedger>,
        config: EscalationConfig,
    ) -> Self {
        let search = CrossArchetypeSearch::new(Arc::clone(&corpus), Arc::clone(&router), &config);
        Self {
            context_type: context_type.into(),
            catalog,
            evolution,
            guard: AntiPatternGuard::new(),
            router,
            search,
            corpus,
            ledger,
            config,
        }
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    pub fn mode_for(&self, retries: u32) -> EscalationMode {
        EscalationMode::for_retries(retries, self.config.explore_after, self.config.transform_after)
    }

    /// Run one escalation step within a session's budget.
    pub async fn escalate(
        &self,
        budget: &HealingBudget,
        request: &RepairRequest,
    ) -> Result<EscalationResult, EngineError> {
        budget.ensure_available()?;

        let mode = self.mode_for(request.retries);
        info!(
            archetype = %request.archetype,
            retries = request.retries,
            %mode,
            "Selected escalation mode"
        );

        match mode {
            EscalationMode::Standard => {
                let routed = self.route_standard(request, mode).await?;
                Ok(from_routing(routed, None))
            }
            EscalationMode::Exploratory => self.explore(request).await,
            EscalationMode::Transformational => Ok(self.transform(request).await),
        }
    }

    async fn route_standard(
        &self,
        request: &RepairRequest,
        mode: EscalationMode,
    ) -> Result<RoutingResult, EngineError> {
        let context = self.context_type.as_str();
        let archetype = request.archetype.as_str();

        let evolved = self
            .evolution
            .evolve(context, archetype, self.catalog.options().to_vec())
            .await;

        let anti_patterns = self
            .evolution
            .get_anti_patterns(context, archetype, self.config.anti_pattern_limit)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Anti-pattern lookup failed, routing without penalties");
                Vec::new()
            });
        let history = self
            .corpus
            .failure_history(context, archetype)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failure history lookup failed");
                FailureHistory::new()
            });

        let options = self.guard.adjust(
            evolved.into_iter().map(EvolvedOption::into_option).collect(),
            &anti_patterns,
            &history,
        );

        let route = RouteRequest::new(request.error_text.clone(), context, archetype)
            .with_default_strategy(self.catalog.default_id())
            .with_mode(mode);
        Ok(self.router.route(&route, options).await?)
    }

    async fn explore(&self, request: &RepairRequest) -> Result<EscalationResult, EngineError> {
        let routed = self
            .route_standard(request, EscalationMode::Exploratory)
            .await?;

        let flagged = self
            .evolution
            .get_anti_patterns(
                &self.context_type,
                &request.archetype,
                self.config.anti_pattern_limit,
            )
            .await
            .unwrap_or_default();
        let excluded: HashSet<&str> = flagged.iter().map(|a| a.option_id.as_str()).collect();

        let matches = self
            .search
            .search(&self.context_type, &request.archetype, &request.error_text, &excluded)
            .await;
        if matches.is_empty() {
            info!("No cross-archetype matches, keeping standard result");
            return Ok(from_routing(routed, None));
        }

        let averaged = average_parameters(
            &routed.parameter_vector,
            matches.iter().map(|m| &m.case.parameters),
        );
        if !self
            .ledger
            .amend_parameters(&routed.decision_id, averaged.clone())
            .await
        {
            warn!(decision_id = %routed.decision_id, "Decision left the ledger before amendment");
        }

        let sources: Vec<String> = matches.into_iter().map(|m| m.case.archetype).collect();
        info!(sources = ?sources, "Blended cross-archetype solutions");

        let mut result = from_routing(routed, Some(sources));
        result.parameter_vector = averaged;
        Ok(result)
    }

    async fn transform(&self, request: &RepairRequest) -> EscalationResult {
        let strategy = request
            .current_strategy
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.catalog.default_id().to_string());

        let base = request.current_parameters.clone().unwrap_or_else(|| {
            self.catalog
                .get(&strategy)
                .or_else(|| self.catalog.get(self.catalog.default_id()))
                .map(|o| o.parameters.clone())
                .unwrap_or_default()
        });

        let record = mutation::mutate(&request.error_text, &base);
        info!(
            operator = %record.operator,
            changed = ?record.changed_keys(),
            "Proposed parameter mutation"
        );

        let decision = Decision::pending(
            self.context_type.clone(),
            request.archetype.clone(),
            &request.error_text,
            strategy.clone(),
            record.mutated_params.clone(),
            Vec::new(),
            EscalationMode::Transformational,
        );
        let decision_id = self.ledger.register(decision).await;

        EscalationResult {
            selected_strategy: strategy,
            // Mutated values are reachable only through the record's gate
            parameter_vector: base,
            mode: EscalationMode::Transformational,
            decision_id,
            confidence: None,
            status: RoutingStatus::Nominal,
            extensions: BTreeMap::new(),
            source_archetypes: None,
            mutation_record: Some(record),
        }
    }
}

fn from_routing(routed: RoutingResult, source_archetypes: Option<Vec<String>>) -> EscalationResult {
    EscalationResult {
        selected_strategy: routed.selected_id,
        parameter_vector: routed.parameter_vector,
        mode: routed.mode,
        decision_id: routed.decision_id,
        confidence: Some(routed.confidence),
        status: routed.status,
        extensions: routed.extensions,
        source_archetypes,
        mutation_record: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embeddings::HashEmbeddingProvider;
    use crate::adapters::memory::{InMemoryLearnedRecordRepository, InMemoryOutcomeCorpus};
    use crate::domain::models::{
        BudgetLimits, EvolutionConfig, MutationOperator, Outcome, ParamValue, RouterConfig,
        SuccessCase,
    };
    use crate::domain::ports::NullDecisionSink;
    use crate::services::embedding_cache::EmbeddingCache;
    use std::time::Duration;

    struct Harness {
        controller: EscalationController,
        corpus: Arc<InMemoryOutcomeCorpus>,
        ledger: Arc<DecisionLedger>,
    }

    fn harness(explore_after: u32, transform_after: u32) -> Harness {
        let embeddings = Arc::new(EmbeddingCache::with_settings(
            Arc::new(HashEmbeddingProvider::new(32)),
            100,
            Duration::from_secs(60),
            Duration::from_secs(5),
            32,
        ));
        let ledger = Arc::new(DecisionLedger::new(
            Arc::new(NullDecisionSink),
            Duration::from_secs(60),
            100,
        ));
        let router = Arc::new(AttentionRouter::new(
            embeddings,
            Arc::clone(&ledger),
            &RouterConfig::default(),
        ));
        let evolution = Arc::new(EvolutionStore::new(
            Arc::new(InMemoryLearnedRecordRepository::new()),
            EvolutionConfig::default(),
        ));
        let corpus = Arc::new(InMemoryOutcomeCorpus::new());
        let config = EscalationConfig {
            explore_after,
            transform_after,
            // accept every match, hash embeddings carry no geometry
            exploratory_min_score: f64::NEG_INFINITY,
            ..EscalationConfig::default()
        };
        let controller = EscalationController::new(
            "repair",
            StrategyCatalog::canonical(),
            evolution,
            router,
            corpus.clone(),
            Arc::clone(&ledger),
            config,
        );
        Harness {
            controller,
            corpus,
            ledger,
        }
    }

    fn budget() -> HealingBudget {
        HealingBudget::new(BudgetLimits::default(), 100)
    }

    #[test]
    fn test_mode_thresholds() {
        let h = harness(2, 3);
        assert_eq!(h.controller.mode_for(0), EscalationMode::Standard);
        assert_eq!(h.controller.mode_for(2), EscalationMode::Exploratory);
        assert_eq!(h.controller.mode_for(3), EscalationMode::Transformational);
    }

    #[tokio::test]
    async fn test_standard_routes_over_catalog() {
        let h = harness(2, 4);
        let result = h
            .controller
            .escalate(&budget(), &RepairRequest::new("SyntaxError: Unexpected token", "dashboard", 0))
            .await
            .unwrap();

        assert_eq!(result.mode, EscalationMode::Standard);
        assert!(h.controller.catalog().get(&result.selected_strategy).is_some());
        assert!(result.confidence.is_some());
        assert!(result.mutation_record.is_none());
        assert!(h.ledger.get(&result.decision_id).await.is_some());
    }

    #[tokio::test]
    async fn test_exploratory_without_matches_keeps_standard_vector() {
        let h = harness(2, 4);
        let result = h
            .controller
            .escalate(&budget(), &RepairRequest::new("404 on /api/orders", "storefront", 2))
            .await
            .unwrap();

        assert_eq!(result.mode, EscalationMode::Exploratory);
        assert!(result.source_archetypes.is_none());
    }

    #[tokio::test]
    async fn test_exploratory_blends_other_archetypes() {
        let h = harness(2, 4);
        for (archetype, max_edits) in [("dashboard", 20.0), ("blog", 30.0), ("storefront", 99.0)] {
            let mut params = ParameterVector::new();
            params.insert("max_edits".into(), ParamValue::Number(max_edits));
            h.corpus
                .record_success(&SuccessCase::new(
                    "repair",
                    archetype,
                    "404 on /api/items",
                    "config-fix",
                    params,
                    9.0,
                ))
                .await
                .unwrap();
        }

        let result = h
            .controller
            .escalate(&budget(), &RepairRequest::new("404 on /api/orders", "storefront", 3))
            .await
            .unwrap();

        let mut sources = result.source_archetypes.clone().unwrap();
        sources.sort();
        assert_eq!(sources, vec!["blog", "dashboard"]);

        let recorded = h.ledger.get(&result.decision_id).await.unwrap();
        assert_eq!(recorded.parameter_vector_used, result.parameter_vector);
        assert!(recorded.learnable);
    }

    #[tokio::test]
    async fn test_exploratory_skips_strategies_flagged_here() {
        let h = harness(2, 4);
        for (archetype, strategy) in [("dashboard", "config-fix"), ("blog", "syntax-fix")] {
            h.corpus
                .record_success(&SuccessCase::new(
                    "repair",
                    archetype,
                    "404 on /api/items",
                    strategy,
                    ParameterVector::new(),
                    9.0,
                ))
                .await
                .unwrap();
        }
        for _ in 0..3 {
            let decision = Decision::pending(
                "repair",
                "storefront",
                "404 on /api/cart",
                "config-fix",
                ParameterVector::new(),
                Vec::new(),
                EscalationMode::Standard,
            );
            h.controller
                .evolution
                .update(&decision, &Outcome::new(false, 1.0, "route still missing"))
                .await
                .unwrap();
        }

        let result = h
            .controller
            .escalate(&budget(), &RepairRequest::new("404 on /api/orders", "storefront", 2))
            .await
            .unwrap();

        assert_eq!(result.source_archetypes, Some(vec!["blog".to_string()]));
    }

    #[tokio::test]
    async fn test_transformational_mutates_current_parameters() {
        let h = harness(2, 4);
        let mut current = ParameterVector::new();
        current.insert("strict_types".into(), ParamValue::Bool(true));
        current.insert("max_edits".into(), ParamValue::Number(5.0));
        let request = RepairRequest::new("eslint: 12 problems", "dashboard", 4)
            .with_current("syntax-fix", current.clone());

        let result = h.controller.escalate(&budget(), &request).await.unwrap();

        assert_eq!(result.mode, EscalationMode::Transformational);
        assert_eq!(result.selected_strategy, "syntax-fix");
        assert_eq!(result.parameter_vector, current);
        let record = result.mutation_record.unwrap();
        assert_eq!(record.operator, MutationOperator::Drop);
        assert_eq!(record.mutated_params["strict_types"], ParamValue::Bool(false));
        assert!(record.applicable_parameters().is_none());

        let decision = h.ledger.get(&result.decision_id).await.unwrap();
        assert!(!decision.learnable);
        assert_eq!(decision.parameter_vector_used, record.mutated_params);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_hard_stop() {
        let h = harness(2, 4);
        let budget = budget();
        while budget.use_llm_call() {}
        while budget.use_critical_regen() {}

        let err = h
            .controller
            .escalate(&budget, &RepairRequest::new("anything", "dashboard", 0))
            .await
            .unwrap_err();
        let EngineError::BudgetExhausted { diagnostic } = err else {
            panic!("expected budget exhaustion");
        };
        assert!(diagnostic.contains("llm_calls: 6/6"));
    }
}
