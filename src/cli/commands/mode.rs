//! Escalation mode lookup.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, EscalationMode};

#[derive(Args, Debug)]
pub struct ModeArgs {
    /// Failed repair attempts so far
    #[arg(short, long)]
    pub retries: u32,
}

#[derive(Debug, Serialize)]
pub struct ModeOutput {
    pub retries: u32,
    pub mode: EscalationMode,
    pub explore_after: u32,
    pub transform_after: u32,
}

impl CommandOutput for ModeOutput {
    fn to_human(&self) -> String {
        format!(
            "{} retr{} -> {} (exploratory from {}, transformational from {})",
            self.retries,
            if self.retries == 1 { "y" } else { "ies" },
            self.mode,
            self.explore_after,
            self.transform_after
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn mode_output(args: &ModeArgs, config: &Config) -> ModeOutput {
    let escalation = &config.escalation;
    ModeOutput {
        retries: args.retries,
        mode: EscalationMode::for_retries(
            args.retries,
            escalation.explore_after,
            escalation.transform_after,
        ),
        explore_after: escalation.explore_after,
        transform_after: escalation.transform_after,
    }
}

pub async fn execute(args: ModeArgs, config: &Config, json: bool) -> Result<()> {
    output(&mode_output(&args, config), json);
    Ok(())
}
