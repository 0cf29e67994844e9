//! Long-term outcome corpus port.
//!
//! High-quality successes feed the exploratory cross-archetype search;
//! low-quality failures feed the anti-pattern guard's failure history.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AntiPatternEntry, FailureHistory, SuccessCase};

#[async_trait]
pub trait OutcomeCorpus: Send + Sync {
    /// Append a solved case.
    async fn record_success(&self, case: &SuccessCase) -> DomainResult<()>;

    /// Append a failure.
    async fn record_anti_pattern(&self, entry: &AntiPatternEntry) -> DomainResult<()>;

    /// Solved cases in `context_type` under any archetype except `excluded_archetype`,
    /// most recent first.
    async fn solved_cases_excluding(
        &self,
        context_type: &str,
        excluded_archetype: &str,
        limit: usize,
    ) -> DomainResult<Vec<SuccessCase>>;

    /// Failure occurrences per option for a context type and archetype.
    async fn failure_history(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<FailureHistory>;
}
