//! Mutation operators for transformational mode.
//!
//! One operator is picked from a keyword heuristic over the error text and
//! applied to the current parameter vector. The result is always wrapped in
//! a [`MutationRecord`] awaiting a sandbox run.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::models::{MutationOperator, MutationRecord, ParamValue, ParameterVector};

static OPERATOR_PATTERNS: OnceLock<Vec<(MutationOperator, Regex)>> = OnceLock::new();

fn operator_patterns() -> &'static [(MutationOperator, Regex)] {
    OPERATOR_PATTERNS.get_or_init(|| {
        [
            (
                MutationOperator::Drop,
                r"(?i)\b(strict|type|types|validation|validate|schema|lint|eslint)\b",
            ),
            (
                MutationOperator::Vary,
                r"(?i)(timeout|timed out|too slow|\bslow\b|performance|out of memory|\bmemory\b|deadline)",
            ),
            (
                MutationOperator::Add,
                r"(?i)(missing|undefined|not found|cannot find|can't find|unresolved|no such)",
            ),
        ]
        .into_iter()
        .filter_map(|(op, pattern)| Regex::new(pattern).ok().map(|re| (op, re)))
        .collect()
    })
}

/// Pick the operator for an error text. First match in DROP, VARY, ADD order; VARY otherwise.
pub fn select_operator(error_text: &str) -> MutationOperator {
    operator_patterns()
        .iter()
        .find(|(_, re)| re.is_match(error_text))
        .map_or(MutationOperator::Vary, |(op, _)| *op)
}

fn doubled(value: f64) -> f64 {
    (value * 2.0).max(value + 1.0)
}

/// Apply an operator, returning the mutated vector.
pub fn apply_operator(operator: MutationOperator, params: &ParameterVector) -> ParameterVector {
    params
        .iter()
        .map(|(key, value)| {
            let mutated = match operator {
                MutationOperator::Drop => drop_constraint(key, value),
                MutationOperator::Vary => vary_approach(key, value),
                MutationOperator::Add => add_capability(key, value),
            };
            (key.clone(), mutated.unwrap_or_else(|| value.clone()))
        })
        .collect()
}

fn drop_constraint(key: &str, value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Bool(true)
            if ["strict", "validat", "lint"].iter().any(|k| key.contains(k)) =>
        {
            Some(ParamValue::Bool(false))
        }
        ParamValue::Number(n) if matches!(key, "max_edits" | "edit_limit" | "max_files") => {
            Some(ParamValue::Number(doubled(*n)))
        }
        _ => None,
    }
}

fn vary_approach(key: &str, value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Bool(b) if key == "incremental" => Some(ParamValue::Bool(!b)),
        ParamValue::Text(approach) if key == "approach" => match approach.as_str() {
            "incremental" => Some(ParamValue::Text("rewrite".to_string())),
            "rewrite" => Some(ParamValue::Text("incremental".to_string())),
            _ => None,
        },
        ParamValue::Number(n)
            if ["budget", "timeout", "tokens", "max_attempts"]
                .iter()
                .any(|k| key.contains(k)) =>
        {
            Some(ParamValue::Number(doubled(*n)))
        }
        _ => None,
    }
}

fn add_capability(key: &str, value: &ParamValue) -> Option<ParamValue> {
    match value {
        ParamValue::Bool(false) if key.starts_with("allow_") => Some(ParamValue::Bool(true)),
        ParamValue::Bool(true) if key.starts_with("restrict") || key.ends_with("_only") => {
            Some(ParamValue::Bool(false))
        }
        _ => None,
    }
}

/// Select and apply an operator, producing a record that awaits its sandbox run.
pub fn mutate(error_text: &str, params: &ParameterVector) -> MutationRecord {
    let operator = select_operator(error_text);
    let mutated = apply_operator(operator, params);
    let mut record = MutationRecord::new(operator, params.clone(), mutated, String::new());

    let changed = record.changed_keys().join(", ");
    record.rationale = if changed.is_empty() {
        format!("{operator} matched the error but no parameter was eligible; vector unchanged")
    } else {
        let intent = match operator {
            MutationOperator::Drop => "relaxed strictness and raised edit limits",
            MutationOperator::Vary => "switched execution approach and doubled budgets",
            MutationOperator::Add => "relaxed capability restrictions",
        };
        format!("{operator}: {intent} ({changed})")
    };
    record
}
