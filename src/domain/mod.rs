//! Domain layer for the Remedy repair-strategy engine
//!
//! This module contains the core models, error types and the port traits
//! that infrastructure adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
