// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # LearningLoop — Outcome Feedback and Behavioral Correction
//!
//! Records outcome ratings keyed by decision identifier and produces
//! [`LearningAdjustment`]s when cumulative mistake counts cross fixed
//! thresholds. Completely decoupled from the decision agent at call
//! time: feedback arrives with nothing but a previously issued id.
//!
//! ## Thresholds
//!
//! - every 3rd cumulative hallucination → a `retrieval_weight`
//!   adjustment with `min_score_threshold = 0.1 * (count / 3)`
//! - every 5th cumulative incorrect → a fixed `prompt_patch` adjustment
//!
//! Thresholds apply to cumulative counts, so the 6th and 9th
//! hallucination each re-trigger independently. A threshold fires only
//! on the feedback that moved its counter, so non-mistake feedback
//! arriving while a counter sits on a multiple does not double-trigger.
//!
//! The full state (records, adjustments, counters) snapshots through
//! [`LearningState`]; a restored loop reproduces identical future
//! threshold behavior.

use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::application::round4;
use crate::domain::{
    AccuracyReport, AdjustmentKind, AuditLayer, AuditSink, Decision, DecisionId, FeedbackRecord,
    LearningAdjustment, LearningError, LearningState, OutcomeRating, ParamValue,
};

/// Post-run evaluation and behavioral improvement without retraining.
pub struct LearningLoop {
    audit: Arc<dyn AuditSink>,
    state: Mutex<LearningState>,
}

impl LearningLoop {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            state: Mutex::new(LearningState::default()),
        }
    }

    pub fn feedback_count(&self) -> usize {
        self.state.lock().feedback.len()
    }

    pub fn adjustment_count(&self) -> usize {
        self.state.lock().adjustments.len()
    }

    pub fn adjustments(&self) -> Vec<LearningAdjustment> {
        self.state.lock().adjustments.clone()
    }

    pub fn mistake_patterns(&self) -> BTreeMap<String, u64> {
        self.state.lock().mistake_counts.clone()
    }

    pub fn feedback_for_decision(&self, decision_id: DecisionId) -> Vec<FeedbackRecord> {
        self.state
            .lock()
            .feedback
            .iter()
            .filter(|f| f.decision_id == decision_id)
            .cloned()
            .collect()
    }

    /// Record one feedback outcome, unconditionally appending it, then
    /// check the adjustment thresholds.
    pub fn record_feedback(&self, record: FeedbackRecord) -> FeedbackRecord {
        let mut state = self.state.lock();
        state.feedback.push(record.clone());

        if record.rating.is_mistake() {
            *state
                .mistake_counts
                .entry(record.rating.as_str().to_string())
                .or_insert(0) += 1;
        }

        self.audit.record(
            AuditLayer::Learning,
            "feedback_recorded",
            json!({
                "decision_id": record.decision_id.to_string(),
                "rating": record.rating.as_str(),
                "has_correction": !record.corrected_answer.is_empty(),
            }),
            Some(record.decision_id),
            "system",
        );

        self.check_for_adjustments(&mut state, &record);

        record
    }

    /// Deterministic auto-grading of a decision against an expected
    /// answer. A convenience path only; callers may submit ratings
    /// directly.
    pub fn evaluate_decision(&self, decision: &Decision, expected: &str) -> FeedbackRecord {
        let answer = decision.answer.to_lowercase();
        let answer = answer.trim();
        let expected_norm = expected.to_lowercase();
        let expected_norm = expected_norm.trim();

        let rating = if answer == expected_norm {
            OutcomeRating::Correct
        } else if answer.contains(expected_norm) || expected_norm.contains(answer) {
            OutcomeRating::PartiallyCorrect
        } else if decision.evidence.is_empty() {
            OutcomeRating::Hallucination
        } else {
            OutcomeRating::Incorrect
        };

        let corrected = if rating == OutcomeRating::Correct {
            ""
        } else {
            expected
        };

        self.record_feedback(FeedbackRecord::new(
            decision.decision_id,
            rating,
            corrected,
            format!("Automated evaluation: {rating}"),
        ))
    }

    /// Accuracy over all recorded feedback. Partially correct answers
    /// count half; an empty history yields 0.0, not a division error.
    pub fn compute_accuracy(&self) -> AccuracyReport {
        let state = self.state.lock();
        let total = state.feedback.len();
        if total == 0 {
            return AccuracyReport {
                total: 0,
                accuracy: 0.0,
                breakdown: BTreeMap::new(),
            };
        }

        let mut breakdown: BTreeMap<String, u64> = BTreeMap::new();
        for record in &state.feedback {
            *breakdown.entry(record.rating.as_str().to_string()).or_insert(0) += 1;
        }

        let correct = breakdown.get("correct").copied().unwrap_or(0) as f64;
        let partial = breakdown.get("partially_correct").copied().unwrap_or(0) as f64;

        AccuracyReport {
            total,
            accuracy: round4((correct + 0.5 * partial) / total as f64),
            breakdown,
        }
    }

    // ── persistence ──

    /// Clone the full learning state as an opaque snapshot.
    pub fn snapshot(&self) -> LearningState {
        self.state.lock().clone()
    }

    /// Replace the loop's state with a previously taken snapshot.
    pub fn restore(&self, snapshot: LearningState) {
        *self.state.lock() = snapshot;
    }

    /// Persist the snapshot as JSON under `<dir>/learning/state.json`.
    pub fn save_state(&self, dir: &Path) -> Result<PathBuf, LearningError> {
        let state_dir = dir.join("learning");
        std::fs::create_dir_all(&state_dir)?;
        let path = state_dir.join("state.json");
        let encoded = serde_json::to_string_pretty(&self.snapshot())?;
        std::fs::write(&path, encoded)?;
        Ok(path)
    }

    /// Restore previously persisted state. Returns false when no state
    /// file exists.
    pub fn load_state(&self, dir: &Path) -> Result<bool, LearningError> {
        let path = dir.join("learning").join("state.json");
        if !path.exists() {
            return Ok(false);
        }
        let raw = std::fs::read_to_string(&path)?;
        let snapshot: LearningState = serde_json::from_str(&raw)?;
        self.restore(snapshot);
        Ok(true)
    }

    // ── adjustment generation ──

    fn check_for_adjustments(&self, state: &mut LearningState, feedback: &FeedbackRecord) {
        let hallucinations = state.mistake_counts.get("hallucination").copied().unwrap_or(0);
        let incorrect = state.mistake_counts.get("incorrect").copied().unwrap_or(0);

        if feedback.rating == OutcomeRating::Hallucination
            && hallucinations > 0
            && hallucinations % 3 == 0
        {
            let mut parameters = BTreeMap::new();
            parameters.insert(
                "min_score_threshold".to_string(),
                ParamValue::Number(0.1 * (hallucinations / 3) as f64),
            );
            let adjustment = LearningAdjustment::new(
                feedback.feedback_id,
                AdjustmentKind::RetrievalWeight,
                format!(
                    "Increasing retrieval confidence threshold after {hallucinations} hallucinations detected"
                ),
                parameters,
            );
            self.audit.record(
                AuditLayer::Learning,
                "adjustment_created",
                serde_json::to_value(&adjustment).unwrap_or(serde_json::Value::Null),
                None,
                "system",
            );
            state.adjustments.push(adjustment);
        }

        if feedback.rating == OutcomeRating::Incorrect && incorrect > 0 && incorrect % 5 == 0 {
            let mut parameters = BTreeMap::new();
            parameters.insert(
                "patch".to_string(),
                ParamValue::Text("require_exact_citation".to_string()),
            );
            let adjustment = LearningAdjustment::new(
                feedback.feedback_id,
                AdjustmentKind::PromptPatch,
                format!("Suggesting stricter evidence grounding after {incorrect} incorrect answers"),
                parameters,
            );
            self.audit.record(
                AuditLayer::Learning,
                "adjustment_created",
                serde_json::to_value(&adjustment).unwrap_or(serde_json::Value::Null),
                None,
                "system",
            );
            state.adjustments.push(adjustment);
        }
    }
}
