// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM provider domain interfaces (Anti-Corruption Layer).
//!
//! The decision agent treats answer generation and review as opaque
//! external functions. Every failure mode is a catchable [`LlmError`];
//! nothing a provider does may propagate out of the agent, which
//! resolves failures to a deterministic fallback answer instead.
//!
//! Implementations live in `infrastructure/llm/`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::evidence::RetrievalResponse;

/// Errors that can occur during external LLM calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No API credential configured")]
    MissingCredential,

    #[error("Call exceeded {0}s timeout")]
    Timeout(u64),
}

impl LlmError {
    /// Whether the retry budget applies. Credential problems never
    /// resolve by retrying.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LlmError::Authentication(_) | LlmError::MissingCredential)
    }
}

/// Generates the candidate answer from query + evidence.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, query: &str, evidence: &RetrievalResponse)
        -> Result<String, LlmError>;

    /// Model identifier recorded on the resulting decision.
    fn model(&self) -> &str;
}

/// Reviews a candidate answer against its evidence. Output is advisory
/// only: it is logged but never alters the policy verdict.
#[async_trait]
pub trait AnswerReviewer: Send + Sync {
    async fn review(
        &self,
        query: &str,
        answer: &str,
        evidence: &RetrievalResponse,
    ) -> Result<String, LlmError>;

    fn model(&self) -> &str;
}

/// How an answer was obtained: a live generation, or the deterministic
/// evidence-only fallback with the failure that forced it. Keeping the
/// cause makes the fallback path observable in tests without network
/// fault injection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated { text: String },
    Fallback { text: String, cause: String },
}

impl GenerationOutcome {
    pub fn text(&self) -> &str {
        match self {
            GenerationOutcome::Generated { text } => text,
            GenerationOutcome::Fallback { text, .. } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GenerationOutcome::Fallback { .. })
    }

    pub fn fallback_cause(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Generated { .. } => None,
            GenerationOutcome::Fallback { cause, .. } => Some(cause),
        }
    }
}
