//! Embedding provider port for semantic vector generation.
//!
//! Defines the trait for providers that convert text into dense vectors
//! with a fixed, provider-declared dimensionality. Callers treat provider
//! failures as recoverable and substitute a deterministic fallback vector.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name (e.g., "openai", "hash").
    fn name(&self) -> &'static str;

    /// Embedding dimension for this provider/model. Zero when undeclared.
    fn dimension(&self) -> usize;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> DomainResult<Vec<f32>>;
}
