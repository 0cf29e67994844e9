//! Run one escalation decision.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, truncate, CommandOutput};
use crate::domain::models::{
    Config, CounterSnapshot, EscalationResult, ParamValue, ParameterVector, FAILURE_REASONS_EXT,
};
use crate::services::{RepairEngine, RepairRequest};

#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Error text of the failed repair
    #[arg(short, long)]
    pub error: String,

    /// Archetype of the artifact being repaired
    #[arg(short, long)]
    pub archetype: String,

    /// Failed repair attempts so far
    #[arg(short, long, default_value_t = 0)]
    pub retries: u32,

    /// Session whose budget is charged
    #[arg(short, long, default_value = "cli")]
    pub session: String,

    /// Strategy used by the previous attempt
    #[arg(long)]
    pub strategy: Option<String>,

    /// Parameters used by the previous attempt (format: "key=value")
    #[arg(short, long = "param")]
    pub params: Vec<String>,

    /// Report the outcome right away with this quality score (0-10)
    #[arg(short, long)]
    pub quality: Option<f64>,

    /// Mark the reported outcome as failed
    #[arg(long, requires = "quality")]
    pub failed: bool,

    /// Details attached to the reported outcome
    #[arg(long, requires = "quality")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RouteOutput {
    pub retries: u32,
    #[serde(flatten)]
    pub result: EscalationResult,
    pub budget: Vec<CounterSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded: Option<bool>,
}

impl CommandOutput for RouteOutput {
    fn to_human(&self) -> String {
        let result = &self.result;
        let mut lines = vec![
            format!("Mode:       {} (retries: {})", result.mode, self.retries),
            format!("Strategy:   {}", result.selected_strategy),
            format!(
                "Confidence: {}",
                result
                    .confidence
                    .map_or_else(|| "n/a".to_string(), |c| format!("{c:.3}"))
            ),
            format!("Status:     {}", result.status),
            format!("Decision:   {}", result.decision_id),
        ];

        if let Some(reasons) = result
            .extensions
            .get(FAILURE_REASONS_EXT)
            .and_then(|v| v.as_array())
        {
            let reasons: Vec<String> = reasons
                .iter()
                .filter_map(|r| r.as_str())
                .map(|r| truncate(r, 60))
                .collect();
            lines.push(format!("Failures:   {}", reasons.join(" | ")));
        }

        if let Some(sources) = &result.source_archetypes {
            lines.push(format!("Borrowed:   {}", sources.join(", ")));
        }
        if let Some(mutation) = &result.mutation_record {
            lines.push(format!(
                "Mutation:   {} ({}) - {}",
                mutation.operator,
                mutation.state_name(),
                truncate(&mutation.rationale, 80)
            ));
        }

        let formatter = TableFormatter::new();
        lines.push(String::new());
        lines.push(formatter.format_parameters(&result.parameter_vector));

        let budget = self
            .budget
            .iter()
            .map(|c| format!("{} {}/{}", c.resource, c.used, c.max))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(format!("Budget:     {budget}"));

        if let Some(recorded) = self.recorded {
            lines.push(format!(
                "Outcome:    {}",
                if recorded { "recorded" } else { "ignored" }
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RouteArgs, config: &Config, json: bool) -> Result<()> {
    let current_parameters = parse_params(&args.params)?;
    let engine = RepairEngine::from_config(config.clone()).await?;
    let session = engine.start_session(&args.session);

    let mut request = RepairRequest::new(&args.error, &args.archetype, args.retries);
    request.current_strategy = args.strategy.clone();
    if !current_parameters.is_empty() {
        request.current_parameters = Some(current_parameters);
    }

    let result = engine
        .decide(&session, request)
        .await
        .context("Failed to decide a repair strategy")?;

    let recorded = match args.quality {
        Some(quality) => Some(
            engine
                .complete(
                    &result.decision_id,
                    !args.failed,
                    quality,
                    args.details.as_deref().unwrap_or_default(),
                )
                .await,
        ),
        None => None,
    };

    output(
        &RouteOutput {
            retries: args.retries,
            result,
            budget: session.budget.snapshot(),
            recorded,
        },
        json,
    );
    engine.end_session(&session.id);
    Ok(())
}

/// Parse `key=value` pairs into typed parameter values.
fn parse_params(raw: &[String]) -> Result<ParameterVector> {
    raw.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Invalid parameter '{pair}', expected key=value"))?;
            let key = key.trim();
            anyhow::ensure!(!key.is_empty(), "Invalid parameter '{pair}', empty key");
            Ok((key.to_string(), parse_value(value.trim())))
        })
        .collect()
}

fn parse_value(value: &str) -> ParamValue {
    if let Ok(b) = value.parse::<bool>() {
        ParamValue::Bool(b)
    } else if let Ok(n) = value.parse::<f64>() {
        ParamValue::Number(n)
    } else {
        ParamValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params(&[
            "max_edits=4".to_string(),
            "verify_after_fix=true".to_string(),
            "approach = rewrite".to_string(),
        ])
        .unwrap();

        assert_eq!(params["max_edits"], ParamValue::Number(4.0));
        assert_eq!(params["verify_after_fix"], ParamValue::Bool(true));
        assert_eq!(params["approach"], ParamValue::Text("rewrite".to_string()));
    }

    #[test]
    fn test_parse_params_rejects_malformed() {
        assert!(parse_params(&["max_edits".to_string()]).is_err());
        assert!(parse_params(&["=4".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_route_output_renders() {
        let engine = RepairEngine::in_memory(Config::default());
        let session = engine.start_session("cli-test");
        let result = engine
            .decide(
                &session,
                RepairRequest::new("SyntaxError: Unexpected token '}'", "landing-page", 0),
            )
            .await
            .unwrap();

        let out = RouteOutput {
            retries: 0,
            result,
            budget: session.budget.snapshot(),
            recorded: None,
        };
        let human = out.to_human();
        assert!(human.contains("Mode:       standard"));
        assert!(human.contains("llm_calls 0/6"));
        assert!(human.contains("Status:     "));

        let json = out.to_json();
        assert_eq!(json["mode"], "standard");
        assert!(json["selected_strategy"].is_string());
        assert!(json["status"] == "nominal" || json["status"] == "degraded");
        assert!(json.get("recorded").is_none());
    }

    #[tokio::test]
    async fn test_route_output_shows_degradation_and_failures() {
        use crate::domain::models::{DegradedReason, RoutingStatus};

        let engine = RepairEngine::in_memory(Config::default());
        let session = engine.start_session("cli-test");
        let mut result = engine
            .decide(&session, RepairRequest::new("TypeError: x is undefined", "dashboard", 0))
            .await
            .unwrap();
        result.status = RoutingStatus::Degraded {
            reasons: vec![DegradedReason::EmbeddingTimeout],
        };
        result.extensions.insert(
            FAILURE_REASONS_EXT.to_string(),
            serde_json::json!(["tests still red"]),
        );

        let out = RouteOutput {
            retries: 0,
            result,
            budget: session.budget.snapshot(),
            recorded: None,
        };
        let human = out.to_human();
        assert!(human.contains("Status:     degraded (embedding timed out"));
        assert!(human.contains("Failures:   tests still red"));

        let json = out.to_json();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["reasons"][0]["kind"], "embedding_timeout");
        assert_eq!(
            json["extensions"]["failure_reasons"],
            serde_json::json!(["tests still red"])
        );
    }
}
