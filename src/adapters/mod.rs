//! Infrastructure adapters for external systems.

pub mod embeddings;
pub mod memory;
pub mod sqlite;
pub mod tracing_sink;

pub use tracing_sink::TracingDecisionSink;
