// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Decision Aggregate
//!
//! A [`Decision`] is immutable once constructed. State transitions never
//! mutate in place: each transition function consumes a decision and
//! produces a *new* value carrying the same identifier, so every state a
//! decision has been in remains a distinct, addressable value in the
//! audit trail.
//!
//! # Invariants
//!
//! - `Running` is the entry state of every `decide` call
//! - `Completed` and `Failed` are terminal
//! - `WaitingApproval` exits only through approve/reject

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::evidence::RetrievalResult;
use crate::domain::policy::PolicyEvaluation;
use crate::domain::short_id;

/// Unique identifier for a Decision. Shared by every state the decision
/// passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecisionId(pub Uuid);

impl DecisionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DecisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DecisionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Running,
    WaitingApproval,
    Completed,
    Failed,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Running => write!(f, "running"),
            AgentState::WaitingApproval => write!(f, "waiting_approval"),
            AgentState::Completed => write!(f, "completed"),
            AgentState::Failed => write!(f, "failed"),
        }
    }
}

/// Answer prefix carried while a decision awaits human approval.
pub const APPROVAL_PREFIX: &str = "[AWAITING APPROVAL] ";

/// Fixed answer for decisions denied outright by policy.
pub const DENIAL_ANSWER: &str = "[DENIED] Policy violation: action not permitted.";

/// One policy-checked, evidence-grounded decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: DecisionId,
    pub query: String,
    pub answer: String,
    pub evidence: Vec<RetrievalResult>,
    pub policy_evaluations: Vec<PolicyEvaluation>,
    pub state: AgentState,
    #[serde(default)]
    pub model_used: String,
    #[serde(default)]
    pub reviewer_model: String,
    pub created_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(
        query: impl Into<String>,
        answer: impl Into<String>,
        evidence: Vec<RetrievalResult>,
        policy_evaluations: Vec<PolicyEvaluation>,
        state: AgentState,
    ) -> Self {
        Self {
            decision_id: DecisionId::new(),
            query: query.into(),
            answer: answer.into(),
            evidence,
            policy_evaluations,
            state,
            model_used: String::new(),
            reviewer_model: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_models(
        mut self,
        model_used: impl Into<String>,
        reviewer_model: impl Into<String>,
    ) -> Self {
        self.model_used = model_used.into();
        self.reviewer_model = reviewer_model.into();
        self
    }

    // ── transitions ──
    //
    // Each transition consumes the old value and returns a new one with
    // the same decision_id.

    /// Park the decision for human review: prefix the answer and move to
    /// `WaitingApproval`.
    pub fn into_waiting_approval(mut self) -> Self {
        self.answer = format!("{APPROVAL_PREFIX}{}", self.answer);
        self.state = AgentState::WaitingApproval;
        self
    }

    /// Human approved: strip the pending marker and complete.
    pub fn into_approved(mut self) -> Self {
        if let Some(stripped) = self.answer.strip_prefix(APPROVAL_PREFIX) {
            self.answer = stripped.to_string();
        }
        self.state = AgentState::Completed;
        self
    }

    /// Human rejected: annotate with the reason and fail.
    pub fn into_rejected(mut self, reason: &str) -> Self {
        self.answer = if reason.is_empty() {
            "[REJECTED]".to_string()
        } else {
            format!("[REJECTED] {reason}")
        };
        self.state = AgentState::Failed;
        self
    }
}

/// Audit-only record of a human replacing a decision's answer.
///
/// An override requires nothing of the agent's state and mutates no
/// stored [`Decision`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanOverride {
    pub override_id: String,
    pub decision_id: DecisionId,
    #[serde(default)]
    pub original_answer: String,
    pub overridden_answer: String,
    #[serde(default)]
    pub reason: String,
    pub overridden_at: DateTime<Utc>,
}

impl HumanOverride {
    pub fn new(
        decision_id: DecisionId,
        overridden_answer: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            override_id: short_id(),
            decision_id,
            original_answer: String::new(),
            overridden_answer: overridden_answer.into(),
            reason: reason.into(),
            overridden_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(state: AgentState) -> Decision {
        Decision::new("q", "an answer", Vec::new(), Vec::new(), state)
    }

    #[test]
    fn waiting_approval_prefixes_answer_and_keeps_id() {
        let d = decision(AgentState::Completed);
        let id = d.decision_id;
        let waiting = d.into_waiting_approval();
        assert_eq!(waiting.decision_id, id);
        assert_eq!(waiting.state, AgentState::WaitingApproval);
        assert_eq!(waiting.answer, "[AWAITING APPROVAL] an answer");
    }

    #[test]
    fn approved_strips_prefix() {
        let approved = decision(AgentState::Completed)
            .into_waiting_approval()
            .into_approved();
        assert_eq!(approved.state, AgentState::Completed);
        assert_eq!(approved.answer, "an answer");
    }

    #[test]
    fn rejected_carries_reason() {
        let rejected = decision(AgentState::WaitingApproval).into_rejected("too risky");
        assert_eq!(rejected.state, AgentState::Failed);
        assert_eq!(rejected.answer, "[REJECTED] too risky");

        let bare = decision(AgentState::WaitingApproval).into_rejected("");
        assert_eq!(bare.answer, "[REJECTED]");
    }
}
