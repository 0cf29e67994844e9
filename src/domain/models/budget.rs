//! Healing budget resources and limits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A costly action capped per repair session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetResource {
    LlmCall,
    CriticalRegen,
    /// Softer resource: exhausting it alone never halts a session.
    DockerRestart,
}

impl BudgetResource {
    pub const ALL: [Self; 3] = [Self::LlmCall, Self::CriticalRegen, Self::DockerRestart];
}

impl fmt::Display for BudgetResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LlmCall => write!(f, "llm_calls"),
            Self::CriticalRegen => write!(f, "critical_regens"),
            Self::DockerRestart => write!(f, "docker_restarts"),
        }
    }
}

/// Maximum uses per resource for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimits {
    pub llm_calls: u32,
    pub critical_regens: u32,
    pub docker_restarts: u32,
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            llm_calls: 6,
            critical_regens: 2,
            docker_restarts: 3,
        }
    }
}

impl BudgetLimits {
    pub const fn max_for(&self, resource: BudgetResource) -> u32 {
        match resource {
            BudgetResource::LlmCall => self.llm_calls,
            BudgetResource::CriticalRegen => self.critical_regens,
            BudgetResource::DockerRestart => self.docker_restarts,
        }
    }
}

/// Used/max snapshot of one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub resource: BudgetResource,
    pub used: u32,
    pub max: u32,
}

impl CounterSnapshot {
    pub const fn remaining(&self) -> u32 {
        self.max.saturating_sub(self.used)
    }
}

/// One entry of the budget audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub resource: BudgetResource,
    pub granted: bool,
    pub used_after: u32,
    pub max: u32,
    pub note: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ({}/{}){}",
            self.at.format("%H:%M:%S"),
            if self.granted { "USE " } else { "DENY" },
            self.resource,
            self.used_after,
            self.max,
            if self.note.is_empty() {
                String::new()
            } else {
                format!(" {}", self.note)
            }
        )
    }
}
