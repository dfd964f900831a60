// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DecisionAgent — Policy-Gated Decisions with Human Approval
//!
//! Orchestrates one decision: evaluates policy over the retrieved
//! evidence, invokes the external generation and review functions, and
//! computes the resulting state. Decisions that a policy routes to
//! NEEDS_APPROVAL are parked in an explicit pending map and exit only
//! through [`DecisionAgent::approve`] / [`DecisionAgent::reject`].
//!
//! ## External-Call Contract
//!
//! Generation and review are the only suspension points in the
//! pipeline. Both are bounded by the configured timeout and retry
//! budget, and any failure resolves to the deterministic evidence-only
//! fallback, never to a failed decision and never to a propagated
//! error. The fallback remains observable through
//! [`GenerationOutcome::Fallback`] and the audit payload.
//!
//! ## Pending Capacity
//!
//! The pending map is bounded by `max_pending` (default 1). A second
//! decision reaching NEEDS_APPROVAL while the map is full resolves by
//! the configured [`PendingOverflow`] policy (rejecting the newcomer or
//! superseding the oldest), never by silent overwrite.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::policy_engine::PolicyEngine;
use crate::config::{PendingOverflow, Settings};
use crate::domain::{
    AgentState, AnswerGenerator, AnswerReviewer, AuditLayer, AuditSink, Decision, DecisionId,
    GenerationOutcome, HumanOverride, LlmError, PolicyVerdict, RetrievalResponse, DENIAL_ANSWER,
};

/// Answer recorded when a new approval request is turned away because
/// the pending map is at capacity.
pub const QUEUE_FULL_REASON: &str =
    "Approval queue is full; retry after the pending decision is resolved.";

const SUPERSEDED_REASON: &str = "Superseded by a newer decision awaiting approval.";

/// Fallback answer length bound, in characters of the top snippet.
const FALLBACK_EXCERPT_CHARS: usize = 500;

/// Stateful agent producing audited, policy-checked decisions.
pub struct DecisionAgent {
    settings: Arc<Settings>,
    policy: Arc<PolicyEngine>,
    audit: Arc<dyn AuditSink>,
    generator: Arc<dyn AnswerGenerator>,
    reviewer: Arc<dyn AnswerReviewer>,
    pending: Mutex<HashMap<DecisionId, Decision>>,
}

impl DecisionAgent {
    pub fn new(
        settings: Arc<Settings>,
        policy: Arc<PolicyEngine>,
        audit: Arc<dyn AuditSink>,
        generator: Arc<dyn AnswerGenerator>,
        reviewer: Arc<dyn AnswerReviewer>,
    ) -> Self {
        Self {
            settings,
            policy,
            audit,
            generator,
            reviewer,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_pending(&self, decision_id: DecisionId) -> bool {
        self.pending.lock().contains_key(&decision_id)
    }

    /// Run the full decision pipeline: policy check, generation, review,
    /// state computation.
    pub async fn decide(
        &self,
        query: &str,
        evidence: &RetrievalResponse,
        context: &HashMap<String, String>,
    ) -> Decision {
        let evaluations = self.policy.evaluate(query, evidence, context);
        let verdict = self.policy.check_allowed(&evaluations);

        // Outright denial skips generation entirely: no external call is
        // ever made for a denied action.
        if verdict == PolicyVerdict::Deny {
            let decision = Decision::new(
                query,
                DENIAL_ANSWER,
                evidence.results.clone(),
                evaluations,
                AgentState::Failed,
            );
            self.audit.record(
                AuditLayer::Reasoning,
                "decision_denied",
                json!({ "query": query }),
                Some(decision.decision_id),
                "system",
            );
            return decision;
        }

        let outcome = self.generate_answer(query, evidence).await;
        let review = self.review_answer(query, outcome.text(), evidence).await;

        let decision = Decision::new(
            query,
            outcome.text(),
            evidence.results.clone(),
            evaluations,
            AgentState::Completed,
        )
        .with_models(self.generator.model(), self.reviewer.model());

        if verdict == PolicyVerdict::NeedsApproval && self.settings.enable_human_in_loop {
            return self.park_for_approval(decision, &review);
        }

        self.audit.record(
            AuditLayer::Reasoning,
            "decision_completed",
            json!({
                "query": query,
                "review": review,
                "fallback_cause": outcome.fallback_cause(),
            }),
            Some(decision.decision_id),
            "system",
        );
        decision
    }

    /// Approve a pending decision. Returns `None` for an identifier that
    /// is not currently pending; agent state is left unchanged.
    pub fn approve(&self, decision_id: DecisionId) -> Option<Decision> {
        let parked = self.pending.lock().remove(&decision_id)?;
        let approved = parked.into_approved();
        self.audit.record(
            AuditLayer::Reasoning,
            "decision_approved",
            json!({}),
            Some(approved.decision_id),
            "human",
        );
        Some(approved)
    }

    /// Reject a pending decision with a reason. Same precondition as
    /// [`DecisionAgent::approve`].
    pub fn reject(&self, decision_id: DecisionId, reason: &str) -> Option<Decision> {
        let parked = self.pending.lock().remove(&decision_id)?;
        let rejected = parked.into_rejected(reason);
        self.audit.record(
            AuditLayer::Reasoning,
            "decision_rejected",
            json!({ "reason": reason }),
            Some(rejected.decision_id),
            "human",
        );
        Some(rejected)
    }

    /// Record a human override. Audit-only: requires nothing of the
    /// pending map and mutates no stored decision.
    pub fn override_answer(
        &self,
        decision_id: DecisionId,
        new_answer: &str,
        reason: &str,
    ) -> HumanOverride {
        let record = HumanOverride::new(decision_id, new_answer, reason);
        self.audit.record_override(&record);
        record
    }

    /// Call the external generator under the timeout/retry budget,
    /// resolving every failure to the deterministic fallback.
    pub async fn generate_answer(
        &self,
        query: &str,
        evidence: &RetrievalResponse,
    ) -> GenerationOutcome {
        let timeout = self.settings.external_call_timeout;
        let attempts = self.settings.max_retries.saturating_add(1);
        let mut cause = String::new();

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, self.generator.generate(query, evidence)).await {
                Ok(Ok(text)) => return GenerationOutcome::Generated { text },
                Ok(Err(err)) => {
                    warn!(%err, attempt, "Answer generation failed");
                    let retryable = err.is_retryable();
                    cause = err.to_string();
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    let err = LlmError::Timeout(timeout.as_secs());
                    warn!(%err, attempt, "Answer generation timed out");
                    cause = err.to_string();
                }
            }
        }

        GenerationOutcome::Fallback {
            text: fallback_answer(evidence),
            cause,
        }
    }

    /// Call the external reviewer under the same bounds. Review output
    /// is advisory only; failures degrade to a skip marker.
    async fn review_answer(
        &self,
        query: &str,
        answer: &str,
        evidence: &RetrievalResponse,
    ) -> String {
        let timeout = self.settings.external_call_timeout;
        let attempts = self.settings.max_retries.saturating_add(1);

        for attempt in 1..=attempts {
            match tokio::time::timeout(timeout, self.reviewer.review(query, answer, evidence)).await
            {
                Ok(Ok(text)) => return text,
                Ok(Err(LlmError::MissingCredential)) => {
                    return "review_skipped:no_api_key".to_string()
                }
                Ok(Err(err)) => {
                    warn!(%err, attempt, "Answer review failed");
                    if !err.is_retryable() {
                        break;
                    }
                }
                Err(_) => {
                    warn!(attempt, "Answer review timed out");
                }
            }
        }

        "review_skipped:call_failed".to_string()
    }

    fn park_for_approval(&self, decision: Decision, review: &str) -> Decision {
        let mut pending = self.pending.lock();

        if pending.len() >= self.settings.max_pending {
            match self.settings.pending_overflow {
                PendingOverflow::Reject => {
                    let turned_away = decision.into_rejected(QUEUE_FULL_REASON);
                    self.audit.record(
                        AuditLayer::Reasoning,
                        "decision_pending_rejected",
                        json!({ "reason": QUEUE_FULL_REASON }),
                        Some(turned_away.decision_id),
                        "system",
                    );
                    return turned_away;
                }
                PendingOverflow::Replace => {
                    let oldest = pending
                        .iter()
                        .min_by_key(|(_, d)| d.created_at)
                        .map(|(id, _)| *id);
                    if let Some(oldest_id) = oldest {
                        if let Some(old) = pending.remove(&oldest_id) {
                            let superseded = old.into_rejected(SUPERSEDED_REASON);
                            info!(decision_id = %superseded.decision_id, "Pending decision superseded");
                            self.audit.record(
                                AuditLayer::Reasoning,
                                "decision_rejected",
                                json!({ "reason": SUPERSEDED_REASON }),
                                Some(superseded.decision_id),
                                "system",
                            );
                        }
                    }
                }
            }
        }

        let waiting = decision.into_waiting_approval();
        pending.insert(waiting.decision_id, waiting.clone());
        self.audit.record(
            AuditLayer::Reasoning,
            "decision_pending_approval",
            json!({ "query": waiting.query, "review": review }),
            Some(waiting.decision_id),
            "system",
        );
        waiting
    }
}

/// Deterministic evidence-only answer used when no LLM is reachable:
/// the top cited snippet, or an explicit no-evidence statement.
fn fallback_answer(evidence: &RetrievalResponse) -> String {
    let Some(top) = evidence.results.first() else {
        return "No evidence found. Cannot answer without grounded data.".to_string();
    };

    let citations = top
        .citations
        .iter()
        .map(|c| format!("[doc={}, page={}]", c.doc_id, c.page))
        .collect::<Vec<_>>()
        .join(", ");
    let excerpt: String = top.text.chars().take(FALLBACK_EXCERPT_CHARS).collect();
    format!("Based on available evidence {citations}: {excerpt}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Citation, Modality, PolicyRule, RetrievalResult, RetrievalStrategy};
    use crate::infrastructure::audit_log::InMemoryAuditLog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingGenerator {
        calls: AtomicUsize,
        response: String,
    }

    impl CountingGenerator {
        fn new(response: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: response.to_string(),
            }
        }
    }

    #[async_trait]
    impl AnswerGenerator for CountingGenerator {
        async fn generate(
            &self,
            _query: &str,
            _evidence: &RetrievalResponse,
        ) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }

        fn model(&self) -> &str {
            "mock-generator"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl AnswerGenerator for FailingGenerator {
        async fn generate(
            &self,
            _query: &str,
            _evidence: &RetrievalResponse,
        ) -> Result<String, LlmError> {
            Err(LlmError::Network("connection refused".to_string()))
        }

        fn model(&self) -> &str {
            "failing-generator"
        }
    }

    struct PassReviewer;

    #[async_trait]
    impl AnswerReviewer for PassReviewer {
        async fn review(
            &self,
            _query: &str,
            _answer: &str,
            _evidence: &RetrievalResponse,
        ) -> Result<String, LlmError> {
            Ok("PASS".to_string())
        }

        fn model(&self) -> &str {
            "mock-reviewer"
        }
    }

    fn test_settings() -> Settings {
        Settings {
            external_call_timeout: Duration::from_secs(2),
            max_retries: 0,
            ..Settings::default()
        }
    }

    fn agent_with(
        settings: Settings,
        generator: Arc<CountingGenerator>,
        rules: Vec<PolicyRule>,
    ) -> DecisionAgent {
        let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditLog::new());
        let policy = Arc::new(PolicyEngine::new(audit.clone()));
        for rule in rules {
            policy.add_rule(rule);
        }
        DecisionAgent::new(
            Arc::new(settings),
            policy,
            audit,
            generator,
            Arc::new(PassReviewer),
        )
    }

    fn evidence_with_one_result() -> RetrievalResponse {
        RetrievalResponse {
            query: "q".to_string(),
            results: vec![RetrievalResult {
                chunk_id: "doc1_t0_0".to_string(),
                text: "the warehouse moved 9000 units".to_string(),
                score: 0.8,
                citations: vec![Citation {
                    doc_id: "doc1".to_string(),
                    page: 2,
                    bbox: None,
                    image_id: None,
                    snippet: "the warehouse moved 9000 units".to_string(),
                }],
                modality: Modality::Text,
            }],
            strategy: RetrievalStrategy::Hybrid,
        }
    }

    fn no_evidence() -> RetrievalResponse {
        RetrievalResponse::empty("q", RetrievalStrategy::Hybrid)
    }

    #[tokio::test]
    async fn deny_verdict_never_invokes_generator() {
        let generator = Arc::new(CountingGenerator::new("answer"));
        let agent = agent_with(
            test_settings(),
            generator.clone(),
            vec![PolicyRule::new(
                "deny_all",
                "",
                "contains:.*",
                PolicyVerdict::Deny,
            )],
        );

        let decision = agent
            .decide("any query", &evidence_with_one_result(), &HashMap::new())
            .await;

        assert_eq!(decision.state, AgentState::Failed);
        assert_eq!(decision.answer, DENIAL_ANSWER);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn allow_verdict_completes_with_generated_answer() {
        let generator = Arc::new(CountingGenerator::new("grounded answer"));
        let agent = agent_with(test_settings(), generator.clone(), Vec::new());

        let decision = agent
            .decide("q", &evidence_with_one_result(), &HashMap::new())
            .await;

        assert_eq!(decision.state, AgentState::Completed);
        assert_eq!(decision.answer, "grounded answer");
        assert_eq!(decision.model_used, "mock-generator");
        assert_eq!(decision.reviewer_model, "mock-reviewer");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn needs_approval_parks_decision_with_prefixed_answer() {
        let generator = Arc::new(CountingGenerator::new("needs a look"));
        let agent = agent_with(
            test_settings(),
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let decision = agent.decide("q", &no_evidence(), &HashMap::new()).await;
        assert_eq!(decision.state, AgentState::WaitingApproval);
        assert!(decision.answer.starts_with("[AWAITING APPROVAL] "));
        assert_eq!(agent.pending_count(), 1);
        assert!(agent.is_pending(decision.decision_id));
    }

    #[tokio::test]
    async fn approval_completes_and_clears_the_slot() {
        let generator = Arc::new(CountingGenerator::new("pending answer"));
        let agent = agent_with(
            test_settings(),
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let decision = agent.decide("q", &no_evidence(), &HashMap::new()).await;
        let approved = agent.approve(decision.decision_id).unwrap();

        assert_eq!(approved.decision_id, decision.decision_id);
        assert_eq!(approved.state, AgentState::Completed);
        assert_eq!(approved.answer, "pending answer");
        assert_eq!(agent.pending_count(), 0);

        // Second approval of the same id is absent, not an error.
        assert!(agent.approve(decision.decision_id).is_none());
    }

    #[tokio::test]
    async fn reject_annotates_reason_and_clears_the_slot() {
        let generator = Arc::new(CountingGenerator::new("pending answer"));
        let agent = agent_with(
            test_settings(),
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let decision = agent.decide("q", &no_evidence(), &HashMap::new()).await;
        let rejected = agent.reject(decision.decision_id, "not grounded").unwrap();

        assert_eq!(rejected.state, AgentState::Failed);
        assert_eq!(rejected.answer, "[REJECTED] not grounded");
        assert_eq!(agent.pending_count(), 0);
    }

    #[tokio::test]
    async fn approve_unknown_id_is_absent_and_leaves_state() {
        let generator = Arc::new(CountingGenerator::new("pending answer"));
        let agent = agent_with(
            test_settings(),
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let decision = agent.decide("q", &no_evidence(), &HashMap::new()).await;
        assert!(agent.approve(DecisionId::new()).is_none());
        assert!(agent.reject(DecisionId::new(), "nope").is_none());
        assert!(agent.is_pending(decision.decision_id));
    }

    #[tokio::test]
    async fn overflow_reject_turns_away_second_pending_decision() {
        let generator = Arc::new(CountingGenerator::new("answer"));
        let agent = agent_with(
            test_settings(),
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let first = agent.decide("first", &no_evidence(), &HashMap::new()).await;
        let second = agent.decide("second", &no_evidence(), &HashMap::new()).await;

        assert_eq!(first.state, AgentState::WaitingApproval);
        assert_eq!(second.state, AgentState::Failed);
        assert!(second.answer.contains("Approval queue is full"));
        assert_eq!(agent.pending_count(), 1);
        assert!(agent.is_pending(first.decision_id));
    }

    #[tokio::test]
    async fn overflow_replace_supersedes_oldest_pending_decision() {
        let generator = Arc::new(CountingGenerator::new("answer"));
        let settings = Settings {
            pending_overflow: PendingOverflow::Replace,
            ..test_settings()
        };
        let agent = agent_with(
            settings,
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let first = agent.decide("first", &no_evidence(), &HashMap::new()).await;
        let second = agent.decide("second", &no_evidence(), &HashMap::new()).await;

        assert_eq!(second.state, AgentState::WaitingApproval);
        assert_eq!(agent.pending_count(), 1);
        assert!(!agent.is_pending(first.decision_id));
        assert!(agent.is_pending(second.decision_id));
    }

    #[tokio::test]
    async fn human_in_loop_disabled_completes_approval_verdicts() {
        let generator = Arc::new(CountingGenerator::new("answer"));
        let settings = Settings {
            enable_human_in_loop: false,
            ..test_settings()
        };
        let agent = agent_with(
            settings,
            generator,
            vec![PolicyRule::new(
                "gate",
                "",
                "no_evidence",
                PolicyVerdict::NeedsApproval,
            )],
        );

        let decision = agent.decide("q", &no_evidence(), &HashMap::new()).await;
        assert_eq!(decision.state, AgentState::Completed);
        assert_eq!(agent.pending_count(), 0);
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_top_snippet() {
        let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditLog::new());
        let policy = Arc::new(PolicyEngine::new(audit.clone()));
        let agent = DecisionAgent::new(
            Arc::new(test_settings()),
            policy,
            audit,
            Arc::new(FailingGenerator),
            Arc::new(PassReviewer),
        );

        let evidence = evidence_with_one_result();
        let outcome = agent.generate_answer("q", &evidence).await;
        assert!(outcome.is_fallback());
        assert!(outcome.fallback_cause().unwrap().contains("connection refused"));
        assert!(outcome.text().contains("[doc=doc1, page=2]"));

        // The failure still flows through the normal state logic.
        let decision = agent.decide("q", &evidence, &HashMap::new()).await;
        assert_eq!(decision.state, AgentState::Completed);
        assert!(decision.answer.starts_with("Based on available evidence"));
    }

    #[tokio::test]
    async fn generator_failure_without_evidence_states_no_evidence() {
        let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditLog::new());
        let policy = Arc::new(PolicyEngine::new(audit.clone()));
        let agent = DecisionAgent::new(
            Arc::new(test_settings()),
            policy,
            audit,
            Arc::new(FailingGenerator),
            Arc::new(PassReviewer),
        );

        let outcome = agent.generate_answer("q", &no_evidence()).await;
        assert!(outcome.is_fallback());
        assert_eq!(
            outcome.text(),
            "No evidence found. Cannot answer without grounded data."
        );
    }

    #[tokio::test]
    async fn override_requires_nothing_and_mutates_nothing() {
        let generator = Arc::new(CountingGenerator::new("answer"));
        let agent = agent_with(test_settings(), generator, Vec::new());

        let record = agent.override_answer(DecisionId::new(), "corrected", "typo");
        assert_eq!(record.overridden_answer, "corrected");
        assert_eq!(agent.pending_count(), 0);
    }
}
