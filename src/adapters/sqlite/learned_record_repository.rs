//! SQLite implementation of the LearnedRecordRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{LearnedKey, LearnedRecord};
use crate::domain::ports::LearnedRecordRepository;

#[derive(Clone)]
pub struct SqliteLearnedRecordRepository {
    pool: SqlitePool,
}

impl SqliteLearnedRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LearnedRecordRepository for SqliteLearnedRecordRepository {
    async fn get(&self, key: &LearnedKey) -> DomainResult<Option<LearnedRecord>> {
        let row: Option<LearnedRecordRow> = sqlx::query_as(
            "SELECT * FROM learned_records WHERE context_type = ? AND archetype = ? AND option_id = ?",
        )
        .bind(&key.context_type)
        .bind(&key.archetype)
        .bind(&key.option_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_context(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<Vec<LearnedRecord>> {
        let rows: Vec<LearnedRecordRow> = sqlx::query_as(
            "SELECT * FROM learned_records WHERE context_type = ? AND archetype = ? ORDER BY option_id",
        )
        .bind(context_type)
        .bind(archetype)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert(&self, record: &LearnedRecord) -> DomainResult<()> {
        let ema_values_json = serde_json::to_string(&record.ema_values)?;
        let sample_count = i64::try_from(record.sample_count)
            .map_err(|e| DomainError::ValidationFailed(format!("sample_count out of range: {e}")))?;

        // sample_count never moves backwards, even if a stale writer slips through
        sqlx::query(
            r#"INSERT INTO learned_records (
                context_type, archetype, option_id, success_rate, sample_count,
                confidence, ema_values_json, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(context_type, archetype, option_id) DO UPDATE SET
                success_rate = excluded.success_rate,
                sample_count = MAX(learned_records.sample_count, excluded.sample_count),
                confidence = excluded.confidence,
                ema_values_json = excluded.ema_values_json,
                updated_at = excluded.updated_at"#,
        )
        .bind(&record.key.context_type)
        .bind(&record.key.archetype)
        .bind(&record.key.option_id)
        .bind(record.success_rate)
        .bind(sample_count)
        .bind(record.confidence)
        .bind(&ema_values_json)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn below_success_rate(
        &self,
        context_type: &str,
        archetype: &str,
        threshold: f64,
        min_samples: u64,
        limit: usize,
    ) -> DomainResult<Vec<LearnedRecord>> {
        let rows: Vec<LearnedRecordRow> = sqlx::query_as(
            r#"SELECT * FROM learned_records
               WHERE context_type = ? AND archetype = ?
                 AND success_rate < ? AND sample_count >= ?
               ORDER BY success_rate ASC, option_id ASC
               LIMIT ?"#,
        )
        .bind(context_type)
        .bind(archetype)
        .bind(threshold)
        .bind(i64::try_from(min_samples).unwrap_or(i64::MAX))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct LearnedRecordRow {
    context_type: String,
    archetype: String,
    option_id: String,
    success_rate: f64,
    sample_count: i64,
    confidence: f64,
    ema_values_json: String,
    updated_at: String,
}

impl TryFrom<LearnedRecordRow> for LearnedRecord {
    type Error = DomainError;

    fn try_from(row: LearnedRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            key: LearnedKey::new(row.context_type, row.archetype, row.option_id),
            success_rate: row.success_rate,
            sample_count: u64::try_from(row.sample_count).map_err(|e| {
                DomainError::SerializationError(format!("negative sample_count: {e}"))
            })?,
            confidence: row.confidence,
            ema_values: serde_json::from_str(&row.ema_values_json)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
