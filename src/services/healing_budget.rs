//! Per-session healing budget.
//!
//! Hard caps on costly repair actions. Every check-and-increment happens
//! under one lock and never suspends. A session halts only when both LLM
//! calls and critical regenerations are spent; Docker restarts are a softer
//! resource.

use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::models::{AuditEntry, BudgetConfig, BudgetLimits, BudgetResource, CounterSnapshot};

/// Audit entries shown in a diagnostic.
const DIAGNOSTIC_RECENT_ENTRIES: usize = 10;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error("Healing budget exhausted\n{diagnostic}")]
    Exhausted { diagnostic: String },
}

#[derive(Debug, Default)]
struct BudgetState {
    used: [u32; 3],
    audit: VecDeque<AuditEntry>,
}

const fn slot(resource: BudgetResource) -> usize {
    match resource {
        BudgetResource::LlmCall => 0,
        BudgetResource::CriticalRegen => 1,
        BudgetResource::DockerRestart => 2,
    }
}

#[derive(Debug)]
pub struct HealingBudget {
    limits: BudgetLimits,
    audit_capacity: usize,
    state: Mutex<BudgetState>,
}

impl HealingBudget {
    pub fn new(limits: BudgetLimits, audit_capacity: usize) -> Self {
        Self {
            limits,
            audit_capacity,
            state: Mutex::new(BudgetState::default()),
        }
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(limits_from(config), config.audit_log_capacity)
    }

    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    fn state(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn can_use(&self, resource: BudgetResource) -> bool {
        self.state().used[slot(resource)] < self.limits.max_for(resource)
    }

    /// Atomically check and consume one unit. Denials are audited too.
    pub fn try_use(&self, resource: BudgetResource, note: &str) -> bool {
        let max = self.limits.max_for(resource);
        let mut state = self.state();
        let used = state.used[slot(resource)];
        let granted = used < max;
        if granted {
            state.used[slot(resource)] = used + 1;
        }
        let used_after = state.used[slot(resource)];

        state.audit.push_back(AuditEntry {
            resource,
            granted,
            used_after,
            max,
            note: note.to_string(),
            at: Utc::now(),
        });
        while state.audit.len() > self.audit_capacity {
            state.audit.pop_front();
        }
        drop(state);

        if granted {
            debug!(%resource, used = used_after, max, "Budget unit consumed");
        } else {
            warn!(%resource, max, "Budget unit denied");
        }
        granted
    }

    pub fn can_use_llm_call(&self) -> bool {
        self.can_use(BudgetResource::LlmCall)
    }

    pub fn use_llm_call(&self) -> bool {
        self.try_use(BudgetResource::LlmCall, "")
    }

    pub fn can_use_critical_regen(&self) -> bool {
        self.can_use(BudgetResource::CriticalRegen)
    }

    pub fn use_critical_regen(&self) -> bool {
        self.try_use(BudgetResource::CriticalRegen, "")
    }

    pub fn can_use_docker_restart(&self) -> bool {
        self.can_use(BudgetResource::DockerRestart)
    }

    pub fn use_docker_restart(&self) -> bool {
        self.try_use(BudgetResource::DockerRestart, "")
    }

    pub fn used(&self, resource: BudgetResource) -> u32 {
        self.state().used[slot(resource)]
    }

    pub fn remaining(&self, resource: BudgetResource) -> u32 {
        self.limits
            .max_for(resource)
            .saturating_sub(self.used(resource))
    }

    pub fn llm_calls_remaining(&self) -> u32 {
        self.remaining(BudgetResource::LlmCall)
    }

    /// True only when both LLM calls and critical regenerations are spent.
    pub fn is_exhausted(&self) -> bool {
        let state = self.state();
        [BudgetResource::LlmCall, BudgetResource::CriticalRegen]
            .iter()
            .all(|r| state.used[slot(*r)] >= self.limits.max_for(*r))
    }

    /// `Err` with a diagnostic when exhausted.
    pub fn ensure_available(&self) -> Result<(), BudgetError> {
        if self.is_exhausted() {
            return Err(BudgetError::Exhausted {
                diagnostic: self.diagnostic(),
            });
        }
        Ok(())
    }

    /// Clear counters and the audit log.
    pub fn reset(&self) {
        let mut state = self.state();
        state.used = [0; 3];
        state.audit.clear();
    }

    pub fn snapshot(&self) -> Vec<CounterSnapshot> {
        let state = self.state();
        BudgetResource::ALL
            .iter()
            .map(|r| CounterSnapshot {
                resource: *r,
                used: state.used[slot(*r)],
                max: self.limits.max_for(*r),
            })
            .collect()
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.state().audit.iter().cloned().collect()
    }

    /// Used/max per counter followed by the most recent operations.
    pub fn diagnostic(&self) -> String {
        let mut out = String::from("Budget:\n");
        for counter in self.snapshot() {
            let _ = writeln!(out, "  {}: {}/{}", counter.resource, counter.used, counter.max);
        }

        let audit = self.audit_log();
        if audit.is_empty() {
            out.push_str("Recent operations: none\n");
        } else {
            out.push_str("Recent operations:\n");
            let skip = audit.len().saturating_sub(DIAGNOSTIC_RECENT_ENTRIES);
            for entry in &audit[skip..] {
                let _ = writeln!(out, "  {entry}");
            }
        }
        out
    }
}

fn limits_from(config: &BudgetConfig) -> BudgetLimits {
    BudgetLimits {
        llm_calls: config.llm_calls,
        critical_regens: config.critical_regens,
        docker_restarts: config.docker_restarts,
    }
}

/// A repair session and its budget.
#[derive(Debug, Clone)]
pub struct RepairSession {
    pub id: String,
    pub budget: Arc<HealingBudget>,
}

/// Budgets keyed by session id.
#[derive(Debug)]
pub struct BudgetRegistry {
    limits: BudgetLimits,
    audit_capacity: usize,
    sessions: Mutex<HashMap<String, Arc<HealingBudget>>>,
}

impl BudgetRegistry {
    pub fn new(limits: BudgetLimits, audit_capacity: usize) -> Self {
        Self {
            limits,
            audit_capacity,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(limits_from(config), config.audit_log_capacity)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<HealingBudget>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session, creating its budget or resetting an existing one.
    pub fn start_session(&self, session_id: &str) -> RepairSession {
        let budget = {
            let mut sessions = self.sessions();
            match sessions.get(session_id) {
                Some(existing) => {
                    existing.reset();
                    Arc::clone(existing)
                }
                None => {
                    let budget = Arc::new(HealingBudget::new(self.limits, self.audit_capacity));
                    sessions.insert(session_id.to_string(), Arc::clone(&budget));
                    budget
                }
            }
        };
        info!(session_id, "Started repair session");
        RepairSession {
            id: session_id.to_string(),
            budget,
        }
    }

    pub fn get(&self, session_id: &str) -> Option<RepairSession> {
        self.sessions().get(session_id).map(|budget| RepairSession {
            id: session_id.to_string(),
            budget: Arc::clone(budget),
        })
    }

    /// Discard a session's budget.
    pub fn end_session(&self, session_id: &str) -> bool {
        let removed = self.sessions().remove(session_id).is_some();
        if removed {
            info!(session_id, "Ended repair session");
        }
        removed
    }

    pub fn active_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> HealingBudget {
        HealingBudget::new(BudgetLimits::default(), 100)
    }

    #[test]
    fn test_llm_calls_capped_at_max() {
        let budget = budget();
        for _ in 0..6 {
            assert!(budget.use_llm_call());
        }
        assert!(!budget.use_llm_call());
        assert!(!budget.can_use_llm_call());
        assert_eq!(budget.llm_calls_remaining(), 0);
        assert_eq!(budget.used(BudgetResource::LlmCall), 6);
    }

    #[test]
    fn test_exhaustion_needs_both_hard_resources() {
        let budget = budget();
        while budget.use_llm_call() {}
        assert!(!budget.is_exhausted());

        while budget.use_docker_restart() {}
        assert!(!budget.is_exhausted());

        while budget.use_critical_regen() {}
        assert!(budget.is_exhausted());

        let Err(BudgetError::Exhausted { diagnostic }) = budget.ensure_available() else {
            panic!("exhausted budget should refuse");
        };
        assert!(diagnostic.contains("llm_calls: 6/6"));
        assert!(diagnostic.contains("critical_regens: 2/2"));
        assert!(diagnostic.contains("DENY"));
    }

    #[test]
    fn test_reset_clears_counters_and_audit() {
        let budget = budget();
        budget.use_llm_call();
        budget.use_critical_regen();
        budget.reset();

        assert_eq!(budget.remaining(BudgetResource::LlmCall), 6);
        assert!(budget.audit_log().is_empty());
        assert!(budget.diagnostic().contains("none"));
    }

    #[test]
    fn test_audit_log_is_bounded() {
        let budget = HealingBudget::new(BudgetLimits::default(), 3);
        for i in 0..10 {
            budget.try_use(BudgetResource::DockerRestart, &format!("restart {i}"));
        }
        let audit = budget.audit_log();
        assert_eq!(audit.len(), 3);
        assert_eq!(audit[2].note, "restart 9");
        assert!(!audit[2].granted);
    }

    #[test]
    fn test_concurrent_use_never_exceeds_max() {
        let budget = Arc::new(budget());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || budget.use_llm_call())
            })
            .collect();
        let granted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|g| *g)
            .count();

        assert_eq!(granted, 6);
        assert_eq!(budget.llm_calls_remaining(), 0);
    }

    #[test]
    fn test_registry_start_resets_existing_session() {
        let registry = BudgetRegistry::new(BudgetLimits::default(), 100);
        let session = registry.start_session("project-1");
        session.budget.use_llm_call();

        let again = registry.start_session("project-1");
        assert!(Arc::ptr_eq(&session.budget, &again.budget));
        assert_eq!(again.budget.llm_calls_remaining(), 6);

        registry.start_session("project-2");
        assert_eq!(registry.active_sessions(), vec!["project-1", "project-2"]);
        assert!(registry.end_session("project-1"));
        assert!(!registry.end_session("project-1"));
        assert!(registry.get("project-1").is_none());
    }
}
