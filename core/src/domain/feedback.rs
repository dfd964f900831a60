// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Feedback and learning value objects.
//!
//! Feedback records and learning adjustments are append-only. The full
//! learning state (records, adjustments, and the running mistake
//! counters) round-trips through [`LearningState`] so that a restored
//! process reproduces identical future threshold behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::decision::DecisionId;

#[derive(Debug, Error)]
pub enum LearningError {
    #[error("Unknown outcome rating: {0}")]
    UnknownRating(String),

    #[error("Failed to persist learning state: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode learning state: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Unique identifier for a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedbackId(pub Uuid);

impl FeedbackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FeedbackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a learning adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjustmentId(pub Uuid);

impl AdjustmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AdjustmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AdjustmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome rating attached to a decision by a human or the auto-grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeRating {
    Correct,
    PartiallyCorrect,
    Incorrect,
    Hallucination,
}

impl OutcomeRating {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeRating::Correct => "correct",
            OutcomeRating::PartiallyCorrect => "partially_correct",
            OutcomeRating::Incorrect => "incorrect",
            OutcomeRating::Hallucination => "hallucination",
        }
    }

    /// Ratings that count toward the mistake thresholds.
    pub fn is_mistake(&self) -> bool {
        matches!(self, OutcomeRating::Incorrect | OutcomeRating::Hallucination)
    }
}

impl fmt::Display for OutcomeRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutcomeRating {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(OutcomeRating::Correct),
            "partially_correct" => Ok(OutcomeRating::PartiallyCorrect),
            "incorrect" => Ok(OutcomeRating::Incorrect),
            "hallucination" => Ok(OutcomeRating::Hallucination),
            other => Err(LearningError::UnknownRating(other.to_string())),
        }
    }
}

/// One outcome report for a previously issued decision. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: FeedbackId,
    pub decision_id: DecisionId,
    pub rating: OutcomeRating,
    #[serde(default)]
    pub corrected_answer: String,
    #[serde(default)]
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        decision_id: DecisionId,
        rating: OutcomeRating,
        corrected_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            feedback_id: FeedbackId::new(),
            decision_id,
            rating,
            corrected_answer: corrected_answer.into(),
            explanation: explanation.into(),
            created_at: Utc::now(),
        }
    }
}

/// What kind of behavioral change an adjustment describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    RetrievalWeight,
    PromptPatch,
    PolicyRule,
}

impl fmt::Display for AdjustmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentKind::RetrievalWeight => write!(f, "retrieval_weight"),
            AdjustmentKind::PromptPatch => write!(f, "prompt_patch"),
            AdjustmentKind::PolicyRule => write!(f, "policy_rule"),
        }
    }
}

/// Named parameter of a learning adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

/// A behavioral correction produced by the learning loop when mistake
/// counts cross a threshold. Only the loop constructs these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningAdjustment {
    pub adjustment_id: AdjustmentId,
    pub trigger_feedback_id: FeedbackId,
    pub kind: AdjustmentKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
    pub applied_at: DateTime<Utc>,
}

impl LearningAdjustment {
    pub fn new(
        trigger_feedback_id: FeedbackId,
        kind: AdjustmentKind,
        description: impl Into<String>,
        parameters: BTreeMap<String, ParamValue>,
    ) -> Self {
        Self {
            adjustment_id: AdjustmentId::new(),
            trigger_feedback_id,
            kind,
            description: description.into(),
            parameters,
            applied_at: Utc::now(),
        }
    }
}

/// Serializable snapshot of the whole learning loop.
///
/// Counters are part of the snapshot, not derived from the records, so
/// that restoring reproduces the exact threshold positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningState {
    #[serde(default)]
    pub feedback: Vec<FeedbackRecord>,
    #[serde(default)]
    pub adjustments: Vec<LearningAdjustment>,
    #[serde(default)]
    pub mistake_counts: BTreeMap<String, u64>,
}

/// Accuracy metrics over all recorded feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub total: usize,
    pub accuracy: f64,
    pub breakdown: BTreeMap<String, u64>,
}
