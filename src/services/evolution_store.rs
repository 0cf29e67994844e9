//! Evolution store: online learning of strategy parameters.
//!
//! `evolve` blends learned EMA values into catalog options, trusting them
//! more as samples accumulate. `update` folds one outcome into the learned
//! record of the decision's option. Read-modify-write cycles on the same
//! key are serialized through a keyed async mutex, so concurrent outcomes
//! for one option never lose an EMA update.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    confidence_weight, AntiPattern, Decision, EvolutionConfig, EvolvedOption, LearnedKey,
    LearnedRecord, Outcome, ParamValue, StrategyOption,
};
use crate::domain::ports::LearnedRecordRepository;

pub struct EvolutionStore {
    repository: Arc<dyn LearnedRecordRepository>,
    config: EvolutionConfig,
    key_locks: Mutex<HashMap<LearnedKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl EvolutionStore {
    pub fn new(repository: Arc<dyn LearnedRecordRepository>, config: EvolutionConfig) -> Self {
        Self {
            repository,
            config,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Blend learned values into each option.
    ///
    /// Options without history, or whose lookup fails, pass through unchanged.
    pub async fn evolve(
        &self,
        context_type: &str,
        archetype: &str,
        options: Vec<StrategyOption>,
    ) -> Vec<EvolvedOption> {
        let lookups = options.iter().map(|option| {
            let key = LearnedKey::new(context_type, archetype, option.id.clone());
            async move { (self.repository.get(&key).await, key) }
        });
        let records = join_all(lookups).await;

        options
            .into_iter()
            .zip(records)
            .map(|(option, (lookup, key))| match lookup {
                Ok(Some(record)) if record.sample_count > 0 => self.blend(option, &record),
                Ok(_) => EvolvedOption::unchanged(option),
                Err(e) => {
                    warn!(key = %key, error = %e, "Learned record lookup failed, using static values");
                    EvolvedOption::unchanged(option)
                }
            })
            .collect()
    }

    fn blend(&self, mut option: StrategyOption, record: &LearnedRecord) -> EvolvedOption {
        let weight = confidence_weight(record.sample_count, self.config.saturation_samples);

        for (key, value) in &mut option.parameters {
            if let (Some(static_value), Some(learned)) =
                (value.as_number(), record.ema_values.get(key))
            {
                *value = ParamValue::Number(weight.mul_add(*learned, (1.0 - weight) * static_value));
            }
        }

        debug!(
            option_id = %option.id,
            confidence_weight = weight,
            samples = record.sample_count,
            "Evolved option from learned record"
        );

        EvolvedOption {
            option,
            confidence_weight: weight,
            sample_count: record.sample_count,
            success_rate: Some(record.success_rate),
        }
    }

    /// Fold an outcome into the learned record of the decision's option.
    ///
    /// Returns the updated record, or `None` for decisions that are not
    /// learned from.
    pub async fn update(
        &self,
        decision: &Decision,
        outcome: &Outcome,
    ) -> DomainResult<Option<LearnedRecord>> {
        if !decision.learnable {
            debug!(decision_id = %decision.decision_id, "Skipping update for non-learnable decision");
            return Ok(None);
        }

        let key = LearnedKey::new(
            decision.context_type.clone(),
            decision.archetype.clone(),
            decision.selected_option.clone(),
        );
        let lock = self.lock_for(&key);
        let updated = {
            let _guard = lock.lock().await;
            self.fold(&key, decision, outcome).await
        };
        self.release_lock(&key, lock);
        updated.map(Some)
    }

    async fn fold(
        &self,
        key: &LearnedKey,
        decision: &Decision,
        outcome: &Outcome,
    ) -> DomainResult<LearnedRecord> {
        let mut record = self
            .repository
            .get(key)
            .await?
            .unwrap_or_else(|| LearnedRecord::empty(key.clone()));

        let observed = outcome
            .reinforces_parameters()
            .then_some(&decision.parameter_vector_used);
        record.observe(
            self.config.alpha,
            outcome.success_signal(),
            observed,
            self.config.saturation_samples,
        );
        self.repository.upsert(&record).await?;

        debug!(
            key = %key,
            success_rate = record.success_rate,
            samples = record.sample_count,
            "Updated learned record"
        );
        Ok(record)
    }

    /// Options whose success rate fell below the anti-pattern threshold.
    pub async fn get_anti_patterns(
        &self,
        context_type: &str,
        archetype: &str,
        limit: usize,
    ) -> DomainResult<Vec<AntiPattern>> {
        let records = self
            .repository
            .below_success_rate(
                context_type,
                archetype,
                self.config.anti_pattern_threshold,
                self.config.anti_pattern_min_samples,
                limit,
            )
            .await?;
        Ok(records.iter().map(AntiPattern::from).collect())
    }

    pub async fn learned_records(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<Vec<LearnedRecord>> {
        self.repository.list_for_context(context_type, archetype).await
    }

    fn lock_for(&self, key: &LearnedKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the key's lock once no other update holds or waits on it.
    fn release_lock(&self, key: &LearnedKey, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self
            .key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // the map and `lock` are the only owners
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// Keys with an update in flight.
    pub fn locked_keys(&self) -> usize {
        self.key_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
