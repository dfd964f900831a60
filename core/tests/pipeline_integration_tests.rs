// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! End-to-end pipeline tests: ingest → retrieve → decide → approve →
//! feedback, with mock external collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use verdict_core::application::DecisionPipeline;
use verdict_core::config::Settings;
use verdict_core::domain::{
    AgentState, AnswerGenerator, AnswerReviewer, AuditLayer, DecisionId, LlmError, PolicyRule,
    PolicyVerdict, RetrievalResponse, RetrievalStrategy,
};
use verdict_core::infrastructure::PlainTextExtractor;

struct CountingGenerator {
    calls: AtomicUsize,
}

impl CountingGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AnswerGenerator for CountingGenerator {
    async fn generate(
        &self,
        _query: &str,
        evidence: &RetrievalResponse,
    ) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let grounding = evidence
            .results
            .first()
            .map(|r| r.text.clone())
            .unwrap_or_else(|| "no evidence".to_string());
        Ok(format!("Grounded answer: {grounding}"))
    }

    fn model(&self) -> &str {
        "mock-generator"
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

fn pipeline_with(generator: Arc<CountingGenerator>) -> DecisionPipeline {
    DecisionPipeline::new(
        test_settings(),
        generator,
        Arc::new(PassReviewer),
        Arc::new(PlainTextExtractor::new()),
    )
}

fn write_corpus() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "The warehouse shipped nine thousand units in March.\n\n\
         Quarterly revenue grew twelve percent year over year.\n\n\
         The committee approved two new staffing positions."
    )
    .unwrap();
    file
}

#[tokio::test]
async fn ingest_then_query_completes_with_grounded_answer() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator.clone());

    let corpus = write_corpus();
    let report = pipeline.ingest(corpus.path()).unwrap();
    assert_eq!(report.text_blocks, 3);
    assert_eq!(report.chunks_indexed, 3);

    let decision = pipeline
        .query(
            "warehouse units shipped",
            5,
            RetrievalStrategy::Hybrid,
            &HashMap::new(),
        )
        .await;

    assert_eq!(decision.state, AgentState::Completed);
    assert!(decision.answer.contains("warehouse"));
    assert!(!decision.evidence.is_empty());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

    // Every result carries citation grounding.
    for result in &decision.evidence {
        assert!(!result.citations.is_empty());
    }
}

#[tokio::test]
async fn no_evidence_query_waits_for_approval_then_approves() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    // Nothing indexed: the default no_hallucination rule matches.
    let decision = pipeline
        .query("anything at all", 5, RetrievalStrategy::Hybrid, &HashMap::new())
        .await;

    assert_eq!(decision.state, AgentState::WaitingApproval);
    assert!(decision.answer.starts_with("[AWAITING APPROVAL] "));

    let approved = pipeline.approve(decision.decision_id).unwrap();
    assert_eq!(approved.state, AgentState::Completed);
    assert!(!approved.answer.starts_with("[AWAITING APPROVAL] "));

    // The slot is cleared: a second approval is absent.
    assert!(pipeline.approve(decision.decision_id).is_none());
}

#[tokio::test]
async fn reject_fails_pending_decision_with_reason() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    let decision = pipeline
        .query("ungrounded question", 5, RetrievalStrategy::Hybrid, &HashMap::new())
        .await;
    assert_eq!(decision.state, AgentState::WaitingApproval);

    let rejected = pipeline
        .reject(decision.decision_id, "insufficient evidence")
        .unwrap();
    assert_eq!(rejected.state, AgentState::Failed);
    assert!(rejected.answer.contains("insufficient evidence"));
}

#[tokio::test]
async fn deny_rule_blocks_generation_entirely() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator.clone());

    pipeline.policy().add_rule(PolicyRule::new(
        "no_destructive_queries",
        "Deny destructive operations",
        "contains:delete|drop|purge",
        PolicyVerdict::Deny,
    ));

    let corpus = write_corpus();
    pipeline.ingest(corpus.path()).unwrap();

    let decision = pipeline
        .query(
            "please delete the warehouse records",
            5,
            RetrievalStrategy::Hybrid,
            &HashMap::new(),
        )
        .await;

    assert_eq!(decision.state, AgentState::Failed);
    assert!(decision.answer.starts_with("[DENIED]"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn context_rules_gate_on_caller_context() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    pipeline.policy().add_rule(PolicyRule::new(
        "prod_changes_need_review",
        "",
        "context:env=prod",
        PolicyVerdict::NeedsApproval,
    ));

    let corpus = write_corpus();
    pipeline.ingest(corpus.path()).unwrap();

    let mut context = HashMap::new();
    context.insert("env".to_string(), "prod".to_string());

    let decision = pipeline
        .query(
            "quarterly revenue growth",
            5,
            RetrievalStrategy::Hybrid,
            &context,
        )
        .await;
    assert_eq!(decision.state, AgentState::WaitingApproval);
}

#[tokio::test]
async fn feedback_accumulates_into_adjustments_and_stats() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    let id = DecisionId::new();
    for _ in 0..3 {
        pipeline
            .submit_feedback(id, "hallucination", "", "made up numbers")
            .unwrap();
    }
    pipeline.submit_feedback(id, "correct", "", "").unwrap();

    let stats = pipeline.learning_stats();
    assert_eq!(stats.feedback_count, 4);
    assert_eq!(stats.adjustment_count, 1);
    assert_eq!(stats.mistake_patterns.get("hallucination"), Some(&3));
    assert_eq!(stats.accuracy.total, 4);

    // Unknown ratings are input errors, surfaced immediately.
    assert!(pipeline.submit_feedback(id, "excellent", "", "").is_err());
}

#[tokio::test]
async fn audit_trail_traces_a_decision_across_layers() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    let corpus = write_corpus();
    pipeline.ingest(corpus.path()).unwrap();

    let decision = pipeline
        .query(
            "warehouse units shipped",
            5,
            RetrievalStrategy::Hybrid,
            &HashMap::new(),
        )
        .await;

    let trace = pipeline.audit_trail(Some(decision.decision_id));
    assert!(trace
        .iter()
        .any(|e| e.event_type == "decision_completed"));

    let all = pipeline.audit_trail(None);
    assert!(all.iter().any(|e| e.layer == AuditLayer::Perception));
    assert!(all.iter().any(|e| e.layer == AuditLayer::Knowledge));
    assert!(all.iter().any(|e| e.event_type == "system_initialized"));
}

#[tokio::test]
async fn auto_grading_feeds_the_learning_loop() {
    let generator = Arc::new(CountingGenerator::new());
    let pipeline = pipeline_with(generator);

    let corpus = write_corpus();
    pipeline.ingest(corpus.path()).unwrap();

    let decision = pipeline
        .query(
            "quarterly revenue growth",
            5,
            RetrievalStrategy::Hybrid,
            &HashMap::new(),
        )
        .await;

    let record = pipeline
        .learning()
        .evaluate_decision(&decision, "revenue grew twelve percent");
    assert!(pipeline
        .learning()
        .feedback_for_decision(decision.decision_id)
        .iter()
        .any(|f| f.feedback_id == record.feedback_id));
    assert_eq!(pipeline.learning_stats().feedback_count, 1);
}
