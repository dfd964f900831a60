// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Concrete adapters behind the domain interfaces: the in-memory audit
//! log, the OpenAI-protocol answer generator, the Anthropic-protocol
//! answer reviewer, and the plain-text content extractor.

pub mod audit_log;
pub mod extract;
pub mod llm;

pub use audit_log::InMemoryAuditLog;
pub use extract::PlainTextExtractor;
pub use llm::{AnthropicReviewer, OpenAiGenerator};
