//! Learned record listing.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, LearnedRecord};
use crate::services::RepairEngine;

#[derive(Args, Debug)]
pub struct LearnedArgs {
    /// Archetype to inspect
    #[arg(short, long)]
    pub archetype: String,

    /// Context type (defaults to the configured one)
    #[arg(long)]
    pub context_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LearnedOutput {
    pub context_type: String,
    pub archetype: String,
    pub records: Vec<LearnedRecord>,
}

impl CommandOutput for LearnedOutput {
    fn to_human(&self) -> String {
        if self.records.is_empty() {
            return format!(
                "No learned records for {}/{}.",
                self.context_type, self.archetype
            );
        }
        format!(
            "Learned records for {}/{}:\n{}",
            self.context_type,
            self.archetype,
            TableFormatter::new().format_learned_records(&self.records)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: LearnedArgs, config: &Config, json: bool) -> Result<()> {
    let context_type = args
        .context_type
        .unwrap_or_else(|| config.context_type.clone());
    let engine = RepairEngine::from_config(config.clone()).await?;

    let records = engine
        .evolution()
        .learned_records(&context_type, &args.archetype)
        .await
        .context("Failed to list learned records")?;

    output(
        &LearnedOutput {
            context_type,
            archetype: args.archetype,
            records,
        },
        json,
    );
    Ok(())
}
