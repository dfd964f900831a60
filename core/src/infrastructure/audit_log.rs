// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory append-only audit log.
//!
//! The authoritative event list for the current process lifetime.
//! Durable audit persistence is an external collaborator's concern;
//! this log satisfies the sink contract (bounded local append, never
//! blocks the caller) and offers the read-side filters the facade and
//! tests use.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::domain::{AuditEvent, AuditLayer, AuditSink, DecisionId};

/// Thread-safe, append-only audit log.
#[derive(Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Every event recorded against one decision, in append order.
    pub fn decision_trace(&self, decision_id: DecisionId) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.decision_id == Some(decision_id))
            .cloned()
            .collect()
    }

    pub fn events_for_layer(&self, layer: AuditLayer) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.layer == layer)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(
        &self,
        layer: AuditLayer,
        event_type: &str,
        payload: Value,
        decision_id: Option<DecisionId>,
        actor: &str,
    ) -> AuditEvent {
        let event = AuditEvent::new(layer, event_type, payload, decision_id, actor);
        self.events.lock().push(event.clone());
        debug!(layer = %event.layer, event_type = %event.event_type, "audit event");
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_append_in_order() {
        let log = InMemoryAuditLog::new();
        log.record(AuditLayer::System, "first", json!({}), None, "system");
        log.record(AuditLayer::Knowledge, "second", json!({}), None, "system");

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "first");
        assert_eq!(events[1].event_type, "second");
    }

    #[test]
    fn decision_trace_filters_by_id() {
        let log = InMemoryAuditLog::new();
        let id = DecisionId::new();
        log.record(AuditLayer::Reasoning, "a", json!({}), Some(id), "system");
        log.record(AuditLayer::Reasoning, "b", json!({}), None, "system");
        log.record(AuditLayer::Learning, "c", json!({}), Some(id), "human");

        let trace = log.decision_trace(id);
        assert_eq!(trace.len(), 2);
        assert_eq!(trace[0].event_type, "a");
        assert_eq!(trace[1].event_type, "c");
    }

    #[test]
    fn layer_filter_selects_component_events() {
        let log = InMemoryAuditLog::new();
        log.record(AuditLayer::Knowledge, "retrieval", json!({}), None, "system");
        log.record(AuditLayer::Learning, "feedback_recorded", json!({}), None, "system");

        assert_eq!(log.events_for_layer(AuditLayer::Knowledge).len(), 1);
        assert_eq!(log.events_for_layer(AuditLayer::Reasoning).len(), 0);
    }
}
