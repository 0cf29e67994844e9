//! In-memory adapters.
//!
//! Process-local implementations of the persistence ports, used in tests and
//! when no database is configured.

pub mod learned_record_repository;
pub mod outcome_corpus;

pub use learned_record_repository::InMemoryLearnedRecordRepository;
pub use outcome_corpus::InMemoryOutcomeCorpus;
