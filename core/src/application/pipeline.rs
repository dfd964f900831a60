// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DecisionPipeline — Wiring Facade
//!
//! Wires the audit log, evidence store, policy engine, decision agent,
//! and learning loop into one entry point, and installs the two
//! baseline policy rules every deployment starts with. The facade adds
//! no semantics of its own: each call delegates to exactly one
//! component, in the control-flow order the pipeline defines
//! (retrieve → decide; feedback is decoupled).

use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::application::{DecisionAgent, EvidenceStore, LearningLoop, PolicyEngine};
use crate::config::Settings;
use crate::domain::{
    AccuracyReport, AnswerGenerator, AnswerReviewer, AuditEvent, AuditLayer, AuditSink,
    ContentExtractor, Decision, DecisionId, FeedbackRecord, HumanOverride, LearningAdjustment,
    LearningError, OutcomeRating, PolicyRule, PolicyVerdict, RetrievalStrategy,
};
use crate::infrastructure::audit_log::InMemoryAuditLog;

/// Summary returned by [`DecisionPipeline::ingest`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub filename: String,
    pub pages: u32,
    pub text_blocks: usize,
    pub images: usize,
    pub chunks_indexed: usize,
}

/// Aggregated learning metrics for operators.
#[derive(Debug, Clone, Serialize)]
pub struct LearningStats {
    pub accuracy: AccuracyReport,
    pub feedback_count: usize,
    pub adjustment_count: usize,
    pub mistake_patterns: std::collections::BTreeMap<String, u64>,
    pub adjustments: Vec<LearningAdjustment>,
}

/// Top-level facade wiring all pipeline components.
pub struct DecisionPipeline {
    audit: Arc<InMemoryAuditLog>,
    evidence: EvidenceStore,
    policy: Arc<PolicyEngine>,
    agent: DecisionAgent,
    learning: LearningLoop,
    extractor: Arc<dyn ContentExtractor>,
}

impl DecisionPipeline {
    pub fn new(
        settings: Settings,
        generator: Arc<dyn AnswerGenerator>,
        reviewer: Arc<dyn AnswerReviewer>,
        extractor: Arc<dyn ContentExtractor>,
    ) -> Self {
        let settings = Arc::new(settings);
        let audit = Arc::new(InMemoryAuditLog::new());
        let sink: Arc<dyn AuditSink> = audit.clone();

        let evidence = EvidenceStore::new(sink.clone());
        let policy = Arc::new(PolicyEngine::new(sink.clone()));
        let agent = DecisionAgent::new(
            settings.clone(),
            policy.clone(),
            sink.clone(),
            generator,
            reviewer,
        );
        let learning = LearningLoop::new(sink.clone());

        let pipeline = Self {
            audit,
            evidence,
            policy,
            agent,
            learning,
            extractor,
        };
        pipeline.install_default_policies();
        pipeline
            .audit
            .record(AuditLayer::System, "system_initialized", json!({}), None, "system");
        pipeline
    }

    fn install_default_policies(&self) {
        self.policy.add_rule(PolicyRule::new(
            "no_hallucination",
            "Require review for answers with no evidence backing",
            "no_evidence",
            PolicyVerdict::NeedsApproval,
        ));
        self.policy.add_rule(PolicyRule::new(
            "low_confidence",
            "Require approval when evidence score is low",
            "min_score:0.01",
            PolicyVerdict::NeedsApproval,
        ));
    }

    /// Extract a document and index it for retrieval.
    pub fn ingest(&self, path: &Path) -> anyhow::Result<IngestReport> {
        let doc = self.extractor.extract(path)?;
        self.audit.record(
            AuditLayer::Perception,
            "document_ingested",
            json!({
                "filename": doc.filename,
                "pages": doc.pages,
                "text_blocks": doc.texts.len(),
                "images_found": doc.images.len(),
            }),
            None,
            "system",
        );

        let chunks_indexed = self.evidence.index(&doc);
        Ok(IngestReport {
            doc_id: doc.doc_id,
            filename: doc.filename,
            pages: doc.pages,
            text_blocks: doc.texts.len(),
            images: doc.images.len(),
            chunks_indexed,
        })
    }

    /// Run a full query: retrieval, then the policy-gated decision.
    pub async fn query(
        &self,
        question: &str,
        top_k: usize,
        strategy: RetrievalStrategy,
        context: &HashMap<String, String>,
    ) -> Decision {
        let evidence = self.evidence.retrieve(question, top_k, strategy);
        self.agent.decide(question, &evidence, context).await
    }

    pub fn approve(&self, decision_id: DecisionId) -> Option<Decision> {
        self.agent.approve(decision_id)
    }

    pub fn reject(&self, decision_id: DecisionId, reason: &str) -> Option<Decision> {
        self.agent.reject(decision_id, reason)
    }

    pub fn override_answer(
        &self,
        decision_id: DecisionId,
        new_answer: &str,
        reason: &str,
    ) -> HumanOverride {
        self.agent.override_answer(decision_id, new_answer, reason)
    }

    /// Submit a feedback rating given as a string. Unknown ratings are
    /// input errors, surfaced immediately and never retried.
    pub fn submit_feedback(
        &self,
        decision_id: DecisionId,
        rating: &str,
        corrected_answer: &str,
        explanation: &str,
    ) -> Result<FeedbackRecord, LearningError> {
        let rating: OutcomeRating = rating.parse()?;
        Ok(self.learning.record_feedback(FeedbackRecord::new(
            decision_id,
            rating,
            corrected_answer,
            explanation,
        )))
    }

    /// Audit events, optionally filtered to one decision.
    pub fn audit_trail(&self, decision_id: Option<DecisionId>) -> Vec<AuditEvent> {
        match decision_id {
            Some(id) => self.audit.decision_trace(id),
            None => self.audit.events(),
        }
    }

    pub fn learning_stats(&self) -> LearningStats {
        LearningStats {
            accuracy: self.learning.compute_accuracy(),
            feedback_count: self.learning.feedback_count(),
            adjustment_count: self.learning.adjustment_count(),
            mistake_patterns: self.learning.mistake_patterns(),
            adjustments: self.learning.adjustments(),
        }
    }

    // ── component access ──

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn agent(&self) -> &DecisionAgent {
        &self.agent
    }

    pub fn learning(&self) -> &LearningLoop {
        &self.learning
    }

    pub fn audit_log(&self) -> &InMemoryAuditLog {
        &self.audit
    }
}
