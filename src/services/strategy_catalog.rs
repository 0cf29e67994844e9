//! Canonical repair strategy catalog.

use crate::domain::models::StrategyOption;

/// General-purpose strategy used when routing confidence is too low.
pub const DEFAULT_STRATEGY_ID: &str = "logic-fix";

/// The canonical repair strategies, in routing order.
pub fn canonical_strategies() -> Vec<StrategyOption> {
    vec![
        StrategyOption::new(
            "syntax-fix",
            "Fix syntax and parse errors: unexpected tokens, unbalanced brackets, \
             malformed JSX or JSON, bad indentation and unterminated strings",
        )
        .with_param("max_edits", 3.0)
        .with_param("max_files", 1.0)
        .with_param("token_budget", 2000.0)
        .with_param("timeout_secs", 60.0)
        .with_param("verify_after_fix", true)
        .with_param("strict_types", true)
        .with_param("allow_new_dependencies", false)
        .with_param("incremental", true)
        .with_param("approach", "incremental"),
        StrategyOption::new(
            "dependency-fix",
            "Resolve import and dependency errors: missing modules, unresolved \
             packages, wrong import paths and version conflicts",
        )
        .with_param("max_edits", 5.0)
        .with_param("max_files", 3.0)
        .with_param("token_budget", 3000.0)
        .with_param("timeout_secs", 90.0)
        .with_param("verify_after_fix", true)
        .with_param("strict_types", true)
        .with_param("allow_new_dependencies", true)
        .with_param("incremental", true)
        .with_param("approach", "incremental"),
        StrategyOption::new(
            DEFAULT_STRATEGY_ID,
            "Correct runtime and logic errors: undefined values, wrong conditions, \
             failing assertions, broken control flow and incorrect return values",
        )
        .with_param("max_edits", 8.0)
        .with_param("max_files", 3.0)
        .with_param("token_budget", 6000.0)
        .with_param("timeout_secs", 120.0)
        .with_param("verify_after_fix", true)
        .with_param("strict_types", true)
        .with_param("allow_new_dependencies", false)
        .with_param("incremental", true)
        .with_param("approach", "incremental"),
        StrategyOption::new(
            "config-fix",
            "Repair configuration: environment variables, build and bundler \
             settings, route tables, ports and framework config files",
        )
        .with_param("max_edits", 4.0)
        .with_param("max_files", 2.0)
        .with_param("token_budget", 2500.0)
        .with_param("timeout_secs", 90.0)
        .with_param("verify_after_fix", true)
        .with_param("strict_types", false)
        .with_param("allow_new_dependencies", false)
        .with_param("incremental", true)
        .with_param("approach", "incremental")
        .with_param("config_only", true),
        StrategyOption::new(
            "stub-fix",
            "Replace stubs, placeholders, TODO bodies and unimplemented functions \
             with working implementations",
        )
        .with_param("max_edits", 12.0)
        .with_param("max_files", 4.0)
        .with_param("token_budget", 8000.0)
        .with_param("timeout_secs", 180.0)
        .with_param("verify_after_fix", true)
        .with_param("strict_types", false)
        .with_param("allow_new_dependencies", false)
        .with_param("incremental", false)
        .with_param("approach", "rewrite"),
    ]
}

/// Fixed set of strategies routed over in standard mode.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyCatalog {
    options: Vec<StrategyOption>,
    default_id: String,
}

impl StrategyCatalog {
    pub fn new(options: Vec<StrategyOption>, default_id: impl Into<String>) -> Self {
        Self {
            options,
            default_id: default_id.into(),
        }
    }

    pub fn canonical() -> Self {
        Self::new(canonical_strategies(), DEFAULT_STRATEGY_ID)
    }

    pub fn options(&self) -> &[StrategyOption] {
        &self.options
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    pub fn get(&self, option_id: &str) -> Option<&StrategyOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::canonical()
    }
}
