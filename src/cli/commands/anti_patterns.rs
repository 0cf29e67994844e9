//! Anti-pattern listing.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{AntiPattern, Config};
use crate::services::RepairEngine;

#[derive(Args, Debug)]
pub struct AntiPatternsArgs {
    /// Archetype to inspect
    #[arg(short, long)]
    pub archetype: String,

    /// Context type (defaults to the configured one)
    #[arg(long)]
    pub context_type: Option<String>,

    /// Maximum number of anti-patterns to list
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct AntiPatternsOutput {
    pub context_type: String,
    pub archetype: String,
    pub threshold: f64,
    pub anti_patterns: Vec<AntiPattern>,
}

impl CommandOutput for AntiPatternsOutput {
    fn to_human(&self) -> String {
        if self.anti_patterns.is_empty() {
            return format!(
                "No anti-patterns for {}/{}.",
                self.context_type, self.archetype
            );
        }
        format!(
            "Options below {:.0}% success for {}/{}:\n{}",
            self.threshold * 100.0,
            self.context_type,
            self.archetype,
            TableFormatter::new().format_anti_patterns(&self.anti_patterns)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: AntiPatternsArgs, config: &Config, json: bool) -> Result<()> {
    let context_type = args
        .context_type
        .unwrap_or_else(|| config.context_type.clone());
    let engine = RepairEngine::from_config(config.clone()).await?;

    let anti_patterns = engine
        .evolution()
        .get_anti_patterns(&context_type, &args.archetype, args.limit)
        .await
        .context("Failed to list anti-patterns")?;

    output(
        &AntiPatternsOutput {
            context_type,
            archetype: args.archetype,
            threshold: config.evolution.anti_pattern_threshold,
            anti_patterns,
        },
        json,
    );
    Ok(())
}
