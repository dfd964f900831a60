// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Audit events and the audit sink interface.
//!
//! Every component emits one audit event per operation, in the order
//! operations complete on that component. The sink is fire-and-forget:
//! it must never block a caller for more than a bounded local append,
//! and the core never reads back through it; queries go through the
//! concrete in-memory log in the infrastructure layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::decision::{DecisionId, HumanOverride};
use crate::domain::short_id;

/// Pipeline layer an audit event originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLayer {
    Perception,
    Knowledge,
    Reasoning,
    Learning,
    System,
}

impl fmt::Display for AuditLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditLayer::Perception => write!(f, "perception"),
            AuditLayer::Knowledge => write!(f, "knowledge"),
            AuditLayer::Reasoning => write!(f, "reasoning"),
            AuditLayer::Learning => write!(f, "learning"),
            AuditLayer::System => write!(f, "system"),
        }
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub layer: AuditLayer,
    pub event_type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub decision_id: Option<DecisionId>,
    pub actor: String,
}

impl AuditEvent {
    pub fn new(
        layer: AuditLayer,
        event_type: impl Into<String>,
        payload: Value,
        decision_id: Option<DecisionId>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            event_id: short_id(),
            timestamp: Utc::now(),
            layer,
            event_type: event_type.into(),
            payload,
            decision_id,
            actor: actor.into(),
        }
    }
}

/// Fire-and-forget audit collaborator consumed by every component.
pub trait AuditSink: Send + Sync {
    /// Append one event. Implementations must be bounded local appends;
    /// failures are logged and swallowed, never surfaced to the caller.
    fn record(
        &self,
        layer: AuditLayer,
        event_type: &str,
        payload: Value,
        decision_id: Option<DecisionId>,
        actor: &str,
    ) -> AuditEvent;

    /// Record a human override alongside system events.
    fn record_override(&self, override_record: &HumanOverride) -> AuditEvent {
        let payload = serde_json::to_value(override_record).unwrap_or(Value::Null);
        self.record(
            AuditLayer::Reasoning,
            "human_override",
            payload,
            Some(override_record.decision_id),
            "human",
        )
    }
}
