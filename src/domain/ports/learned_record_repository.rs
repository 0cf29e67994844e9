//! Persistence port for learned strategy statistics.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LearnedKey, LearnedRecord};

/// Durable store of [`LearnedRecord`]s keyed by `(context type, archetype, option id)`.
///
/// Supports point lookups and upserts. Serializing concurrent updates of the
/// same key is the caller's job; implementations only guarantee that a single
/// `upsert` is atomic.
#[async_trait]
pub trait LearnedRecordRepository: Send + Sync {
    /// Fetch one record.
    async fn get(&self, key: &LearnedKey) -> DomainResult<Option<LearnedRecord>>;

    /// All records for a context type and archetype, ordered by option id.
    async fn list_for_context(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<Vec<LearnedRecord>>;

    /// Insert or replace a record.
    async fn upsert(&self, record: &LearnedRecord) -> DomainResult<()>;

    /// Records with a success rate strictly below `threshold` and at least
    /// `min_samples` samples, worst first.
    async fn below_success_rate(
        &self,
        context_type: &str,
        archetype: &str,
        threshold: f64,
        min_samples: u64,
        limit: usize,
    ) -> DomainResult<Vec<LearnedRecord>>;
}
