//! Infrastructure layer module
//!
//! Process-level concerns shared by the library and the binary:
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
