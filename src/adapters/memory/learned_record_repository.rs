use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{LearnedKey, LearnedRecord};
use crate::domain::ports::LearnedRecordRepository;

/// Learned records held in a `BTreeMap` behind an async lock.
#[derive(Debug, Default)]
pub struct InMemoryLearnedRecordRepository {
    records: RwLock<BTreeMap<LearnedKey, LearnedRecord>>,
}

impl InMemoryLearnedRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl LearnedRecordRepository for InMemoryLearnedRecordRepository {
    async fn get(&self, key: &LearnedKey) -> DomainResult<Option<LearnedRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn list_for_context(
        &self,
        context_type: &str,
        archetype: &str,
    ) -> DomainResult<Vec<LearnedRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.key.context_type == context_type && r.key.archetype == archetype)
            .cloned()
            .collect())
    }

    async fn upsert(&self, record: &LearnedRecord) -> DomainResult<()> {
        let mut records = self.records.write().await;
        let mut record = record.clone();
        if let Some(existing) = records.get(&record.key) {
            record.sample_count = record.sample_count.max(existing.sample_count);
        }
        records.insert(record.key.clone(), record);
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
        let mut matches = self.list_for_context(context_type, archetype).await?;
        matches.retain(|r| r.success_rate < threshold && r.sample_count >= min_samples);
        matches.sort_by(|a, b| {
            a.success_rate
                .total_cmp(&b.success_rate)
                .then_with(|| a.key.option_id.cmp(&b.key.option_id))
        });
        matches.truncate(limit);
        Ok(matches)
    }
}
