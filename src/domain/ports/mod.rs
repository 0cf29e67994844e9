//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces that infrastructure adapters implement:
//! - EmbeddingProvider: text to vector embedding
//! - LearnedRecordRepository: durable learned strategy statistics
//! - OutcomeCorpus: long-term success and anti-pattern corpora
//! - DecisionSink: observability forwarding of decisions and outcomes
//!
//! These traits keep the routing and learning services independent of
//! specific storage engines and network providers.

pub mod decision_sink;
pub mod embedding;
pub mod learned_record_repository;
pub mod outcome_corpus;

pub use decision_sink::{DecisionSink, NullDecisionSink};
pub use embedding::EmbeddingProvider;
pub use learned_record_repository::LearnedRecordRepository;
pub use outcome_corpus::OutcomeCorpus;
