//! Common test utilities for integration tests
//!
//! Shared fixtures for the engine, SQLite pools and catalog options.

#![allow(dead_code)]

use remedy::adapters::sqlite::create_migrated_test_pool;
use remedy::domain::models::{Config, ParamValue, StrategyOption};
use remedy::RepairEngine;
use sqlx::SqlitePool;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// In-memory SQLite pool with every migration applied.
pub async fn setup_test_db() -> SqlitePool {
    create_migrated_test_pool()
        .await
        .expect("failed to create migrated test database")
}

/// Engine over in-memory stores and hash embeddings.
pub fn test_engine() -> RepairEngine {
    RepairEngine::in_memory(Config::default())
}

/// Engine with custom escalation thresholds.
pub fn engine_with_thresholds(explore_after: u32, transform_after: u32) -> RepairEngine {
    let mut config = Config::default();
    config.escalation.explore_after = explore_after;
    config.escalation.transform_after = transform_after;
    RepairEngine::in_memory(config)
}

/// A catalog option with a single numeric parameter.
pub fn option_with(id: &str, description: &str, key: &str, value: f64) -> StrategyOption {
    StrategyOption::new(id, description).with_param(key, ParamValue::Number(value))
}
