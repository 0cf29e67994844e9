//! Deterministic hash embedding provider.
//!
//! Produces the same hash-seeded vectors the embedding cache falls back to.
//! Useful offline and in tests; carries no semantic geometry.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::fallback_embedding;
use crate::domain::ports::EmbeddingProvider;

#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &'static str {
        "hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
        Ok(fallback_embedding(text, self.dimension))
    }
}
