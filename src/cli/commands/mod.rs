//! CLI command implementations.

pub mod anti_patterns;
pub mod learned;
pub mod mode;
pub mod route;
