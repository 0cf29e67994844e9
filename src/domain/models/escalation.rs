//! Escalation ladder modes, mutation records and escalation results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use super::routing::RoutingStatus;
use super::strategy::ParameterVector;

/// Rung of the escalation ladder. Ordered: `Standard < Exploratory < Transformational`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationMode {
    /// Learned catalog strategies routed by attention.
    Standard,
    /// Borrow parameters from similar errors solved under other archetypes.
    Exploratory,
    /// Mutate the current parameters outside the learned distribution.
    Transformational,
}

impl EscalationMode {
    /// Mode for a retry count. Pure and non-decreasing in `retries`.
    pub fn for_retries(retries: u32, explore_after: u32, transform_after: u32) -> Self {
        if retries >= transform_after {
            Self::Transformational
        } else if retries >= explore_after {
            Self::Exploratory
        } else {
            Self::Standard
        }
    }
}

impl fmt::Display for EscalationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Exploratory => write!(f, "exploratory"),
            Self::Transformational => write!(f, "transformational"),
        }
    }
}

/// Transformation applied in transformational mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationOperator {
    /// Relax strictness constraints and raise edit limits.
    Drop,
    /// Toggle the execution approach and double numeric budgets.
    Vary,
    /// Relax capability restrictions.
    Add,
}

impl fmt::Display for MutationOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => write!(f, "DROP"),
            Self::Vary => write!(f, "VARY"),
            Self::Add => write!(f, "ADD"),
        }
    }
}

/// Safety gate a mutation must pass before direct application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ApprovalState {
    AwaitingSandbox,
    SandboxPassed,
    SandboxFailed { reason: String },
    Approved { approver: String, approved_at: DateTime<Utc> },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("Mutation must pass a sandbox run before approval (state: {0})")]
    SandboxNotPassed(String),

    #[error("Mutation sandbox result already recorded (state: {0})")]
    SandboxAlreadyRecorded(String),

    #[error("Approver must be named")]
    AnonymousApproval,
}

/// A parameter mutation produced in transformational mode.
///
/// Never persisted to the evolution store. The mutated parameters are only
/// handed out for direct application after a passing sandbox run and an
/// explicit approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    pub operator: MutationOperator,
    pub original_params: ParameterVector,
    pub mutated_params: ParameterVector,
    pub rationale: String,
    pub approval: ApprovalState,
}

impl MutationRecord {
    pub fn new(
        operator: MutationOperator,
        original_params: ParameterVector,
        mutated_params: ParameterVector,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            operator,
            original_params,
            mutated_params,
            rationale: rationale.into(),
            approval: ApprovalState::AwaitingSandbox,
        }
    }

    /// Parameters to run inside the isolated sandbox.
    pub fn sandbox_parameters(&self) -> &ParameterVector {
        &self.mutated_params
    }

    /// Record the sandbox verdict. Allowed once.
    pub fn record_sandbox_result(
        &mut self,
        passed: bool,
        reason: impl Into<String>,
    ) -> Result<(), MutationError> {
        if self.approval != ApprovalState::AwaitingSandbox {
            return Err(MutationError::SandboxAlreadyRecorded(self.state_name()));
        }
        self.approval = if passed {
            ApprovalState::SandboxPassed
        } else {
            ApprovalState::SandboxFailed {
                reason: reason.into(),
            }
        };
        Ok(())
    }

    /// Explicitly approve direct application.
    pub fn approve(&mut self, approver: impl Into<String>) -> Result<(), MutationError> {
        let approver = approver.into();
        if approver.trim().is_empty() {
            return Err(MutationError::AnonymousApproval);
        }
        if self.approval != ApprovalState::SandboxPassed {
            return Err(MutationError::SandboxNotPassed(self.state_name()));
        }
        self.approval = ApprovalState::Approved {
            approver,
            approved_at: Utc::now(),
        };
        Ok(())
    }

    /// Mutated parameters, available only once approved.
    pub fn applicable_parameters(&self) -> Option<&ParameterVector> {
        match self.approval {
            ApprovalState::Approved { .. } => Some(&self.mutated_params),
            _ => None,
        }
    }

    /// Keys whose values differ between original and mutated vectors.
    pub fn changed_keys(&self) -> Vec<&str> {
        self.mutated_params
            .iter()
            .filter(|(key, value)| self.original_params.get(*key) != Some(*value))
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Approval state as a short label.
    pub fn state_name(&self) -> String {
        match &self.approval {
            ApprovalState::AwaitingSandbox => "awaiting_sandbox",
            ApprovalState::SandboxPassed => "sandbox_passed",
            ApprovalState::SandboxFailed { .. } => "sandbox_failed",
            ApprovalState::Approved { .. } => "approved",
        }
        .to_string()
    }
}

/// Result of one escalation controller decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationResult {
    pub selected_strategy: String,
    pub parameter_vector: ParameterVector,
    pub mode: EscalationMode,
    pub decision_id: String,
    /// Confidence of the underlying routing call, when one was made.
    pub confidence: Option<f64>,
    /// Nominal or degraded, with reasons. Transformational results are nominal.
    #[serde(flatten)]
    pub status: RoutingStatus,
    /// Extensions of the selected option, e.g. recorded failure reasons.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, serde_json::Value>,
    /// Archetypes whose solutions were blended in (exploratory mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_archetypes: Option<Vec<String>>,
    /// Mutation awaiting sandbox and approval (transformational mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_record: Option<MutationRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::strategy::ParamValue;

    fn record() -> MutationRecord {
        let mut original = ParameterVector::new();
        original.insert("strict_types".into(), ParamValue::Bool(true));
        let mut mutated = original.clone();
        mutated.insert("strict_types".into(), ParamValue::Bool(false));
        MutationRecord::new(MutationOperator::Drop, original, mutated, "relax")
    }

    #[test]
    fn test_mode_thresholds() {
        assert_eq!(EscalationMode::for_retries(0, 2, 3), EscalationMode::Standard);
        assert_eq!(EscalationMode::for_retries(2, 2, 3), EscalationMode::Exploratory);
        assert_eq!(EscalationMode::for_retries(3, 2, 3), EscalationMode::Transformational);
        assert_eq!(EscalationMode::for_retries(3, 3, 3), EscalationMode::Transformational);
    }

    #[test]
    fn test_mode_ordering() {
        assert!(EscalationMode::Standard < EscalationMode::Exploratory);
        assert!(EscalationMode::Exploratory < EscalationMode::Transformational);
    }

    #[test]
    fn test_approval_requires_sandbox() {
        let mut mutation = record();
        assert!(mutation.applicable_parameters().is_none());
        assert!(matches!(
            mutation.approve("reviewer"),
            Err(MutationError::SandboxNotPassed(_))
        ));

        mutation.record_sandbox_result(true, "").unwrap();
        assert!(mutation.applicable_parameters().is_none());
        mutation.approve("reviewer").unwrap();
        assert!(mutation.applicable_parameters().is_some());
    }

    #[test]
    fn test_failed_sandbox_is_terminal() {
        let mut mutation = record();
        mutation.record_sandbox_result(false, "tests regressed").unwrap();
        assert!(mutation.approve("reviewer").is_err());
        assert!(mutation.record_sandbox_result(true, "").is_err());
        assert!(mutation.applicable_parameters().is_none());
    }

    #[test]
    fn test_anonymous_approval_rejected() {
        let mut mutation = record();
        mutation.record_sandbox_result(true, "").unwrap();
        assert_eq!(mutation.approve("  "), Err(MutationError::AnonymousApproval));
    }

    #[test]
    fn test_changed_keys() {
        assert_eq!(record().changed_keys(), vec!["strict_types"]);
    }
}
