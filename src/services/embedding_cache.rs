//! Bounded embedding cache with deterministic fallback.
//!
//! Wraps an [`EmbeddingProvider`] with a moka cache keyed by content hash.
//! Provider failures never surface: the failing text gets a hash-seeded
//! fallback vector instead, flagged so the router can report degradation.
//! Fallback vectors are not cached, so a recovered provider is used on the
//! next lookup.

use futures::future::join_all;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::models::{content_key, fallback_embedding, EmbeddingConfig};
use crate::domain::ports::EmbeddingProvider;

/// One embedded text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedded {
    pub vector: Arc<Vec<f32>>,
    /// True when the provider failed and the hash fallback was used.
    pub fallback: bool,
}

/// Result of embedding a batch of texts.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingBatch {
    /// One entry per input text, in input order.
    Ready(Vec<Embedded>),
    /// The fan-out did not finish within the configured bound.
    TimedOut,
}

pub struct EmbeddingCache {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Cache<String, Arc<Vec<f32>>>,
    fallback_dimension: usize,
    timeout: Duration,
}

impl EmbeddingCache {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::with_settings(
            provider,
            config.cache_capacity,
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_secs(config.timeout_secs),
            config.fallback_dimension,
        )
    }

    pub fn with_settings(
        provider: Arc<dyn EmbeddingProvider>,
        capacity: u64,
        ttl: Duration,
        timeout: Duration,
        fallback_dimension: usize,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            provider,
            cache,
            fallback_dimension,
            timeout,
        }
    }

    /// Dimension of every vector this cache hands out.
    ///
    /// The provider's declared dimension, or the fallback dimension when the
    /// provider declares none.
    pub fn dimension(&self) -> usize {
        match self.provider.dimension() {
            0 => self.fallback_dimension,
            declared => declared,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Embed one text, consulting the cache first.
    pub async fn embed(&self, text: &str) -> Embedded {
        let key = format!("{}:{}", self.provider.name(), content_key(text));

        if let Some(vector) = self.cache.get(&key).await {
            return Embedded {
                vector,
                fallback: false,
            };
        }

        match self.provider.embed(text).await {
            Ok(vector) => {
                let vector = Arc::new(vector);
                self.cache.insert(key, Arc::clone(&vector)).await;
                Embedded {
                    vector,
                    fallback: false,
                }
            }
            Err(e) => {
                warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Embedding provider failed, using deterministic fallback"
                );
                Embedded {
                    vector: Arc::new(fallback_embedding(text, self.dimension())),
                    fallback: true,
                }
            }
        }
    }

    /// Embed several texts concurrently.
    ///
    /// Results are reassembled by position, so arrival order never affects
    /// the output. The whole fan-out is bounded by the configured timeout.
    pub async fn embed_many(&self, texts: &[&str]) -> EmbeddingBatch {
        let lookups = join_all(texts.iter().map(|text| self.embed(text)));

        match tokio::time::timeout(self.timeout, lookups).await {
            Ok(embedded) => {
                debug!(count = embedded.len(), "Embedded batch");
                EmbeddingBatch::Ready(embedded)
            }
            Err(_) => {
                warn!(
                    count = texts.len(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Embedding fan-out timed out"
                );
                EmbeddingBatch::TimedOut
            }
        }
    }

    /// Approximate number of cached vectors.
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::{DomainError, DomainResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingProvider {
        fn new(fail: bool, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
                delay,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn dimension(&self) -> usize {
            4
        }

        async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(DomainError::EmbeddingFailed("offline".to_string()));
            }
            Ok(vec![text.len() as f32, 0.0, 0.0, 1.0])
        }
    }

    fn cache(provider: Arc<CountingProvider>, timeout: Duration) -> EmbeddingCache {
        EmbeddingCache::with_settings(provider, 100, Duration::from_secs(60), timeout, 8)
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let provider = Arc::new(CountingProvider::new(false, Duration::ZERO));
        let cache = cache(Arc::clone(&provider), Duration::from_secs(5));

        let first = cache.embed("ImportError").await;
        let second = cache.embed("ImportError").await;

        assert_eq!(first, second);
        assert!(!first.fallback);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_uses_uncached_fallback() {
        let provider = Arc::new(CountingProvider::new(true, Duration::ZERO));
        let cache = cache(Arc::clone(&provider), Duration::from_secs(5));

        let first = cache.embed("route 404").await;
        let second = cache.embed("route 404").await;

        assert!(first.fallback);
        assert_eq!(first.vector.len(), 4);
        assert_eq!(first.vector, second.vector);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_batch_preserves_input_order() {
        let provider = Arc::new(CountingProvider::new(false, Duration::ZERO));
        let cache = cache(provider, Duration::from_secs(5));

        let EmbeddingBatch::Ready(batch) = cache.embed_many(&["a", "abc", "ab"]).await else {
            panic!("batch should not time out");
        };
        let lengths: Vec<f32> = batch.iter().map(|e| e.vector[0]).collect();
        assert_eq!(lengths, vec![1.0, 3.0, 2.0]);
    }

    #[tokio::test]
    async fn test_batch_times_out() {
        let provider = Arc::new(CountingProvider::new(false, Duration::from_millis(200)));
        let cache = cache(provider, Duration::from_millis(20));

        assert_eq!(cache.embed_many(&["slow"]).await, EmbeddingBatch::TimedOut);
    }
}
