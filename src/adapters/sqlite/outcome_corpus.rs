//! SQLite implementation of the OutcomeCorpus.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AntiPatternEntry, FailureHistory, FailureOccurrence, SuccessCase,
};
use crate::domain::ports::OutcomeCorpus;

/// Reasons kept per option in a failure history.
const MAX_REASONS_PER_OPTION: usize = 5;

#[derive(Clone)]
pub struct SqliteOutcomeCorpus {
    pool: SqlitePool,
}

impl SqliteOutcomeCorpus {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutcomeCorpus for SqliteOutcomeCorpus {
    async fn record_success(&self, case: &SuccessCase) -> DomainResult<()> {
        let parameters_json = serde_json::to_string(&case.parameters)?;

        sqlx::query(
            r#"INSERT INTO success_corpus (
                id, context_type, archetype, error_excerpt, strategy_id,
                parameters_json, quality_score, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&case.id)
        .bind(&case.context_type)
        .bind(&case.archetype)
        .bind(&case.error_excerpt)
        .bind(&case.strategy_id)
        .bind(&parameters_json)
        .bind(case.quality_score)
        .bind(case.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_anti_pattern(&self, entry: &AntiPatternEntry) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO anti_pattern_corpus (
                id, context_type, archetype, option_id, error_excerpt,
                reason, quality_score, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&entry.id)
        .bind(&entry.context_type)
        .bind(&entry.archetype)
        .bind(&entry.option_id)
        .bind(&entry.error_excerpt)
        .bind(&entry.reason)
        .bind(entry.quality_score)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn solved_cases_excluding(
        &self,
        context_type: &str,
        excluded_archetype: &str,
        limit: usize,
    ) -> DomainResult<Vec<SuccessCase>> {
        let rows: Vec<SuccessCaseRow> = sqlx::query_as(
            r#"SELECT * FROM success_corpus
               WHERE context_type = ? AND archetype != ?
               ORDER BY created_at DESC, id ASC
               LIMIT ?"#,
        )
        .bind(context_type)
        .bind(excluded_archetype)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn failure_history(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<FailureHistory> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"SELECT option_id, reason FROM anti_pattern_corpus
               WHERE context_type = ? AND archetype = ?
               ORDER BY created_at DESC"#,
        )
        .bind(context_type)
        .bind(archetype)
        .fetch_all(&self.pool)
        .await?;

        let mut history = FailureHistory::new();
        for (option_id, reason) in rows {
            let occurrence: &mut FailureOccurrence = history.entry(option_id).or_default();
            occurrence.count += 1;
            if occurrence.reasons.len() < MAX_REASONS_PER_OPTION && !reason.is_empty() {
                occurrence.reasons.push(reason);
            }
        }
        Ok(history)
    }
}

#[derive(sqlx::FromRow)]
struct SuccessCaseRow {
    id: String,
    context_type: String,
    archetype: String,
    error_excerpt: String,
    strategy_id: String,
    parameters_json: String,
    quality_score: f64,
    created_at: String,
}

impl TryFrom<SuccessCaseRow> for SuccessCase {
    type Error = DomainError;

    fn try_from(row: SuccessCaseRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            context_type: row.context_type,
            archetype: row.archetype,
            error_excerpt: row.error_excerpt,
            strategy_id: row.strategy_id,
            parameters: serde_json::from_str(&row.parameters_json)?,
            quality_score: row.quality_score,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
