// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM provider adapters (Anti-Corruption Layer).
//!
//! Each adapter isolates one vendor API behind the domain traits in
//! [`crate::domain::llm`]. Swapping providers never touches the agent.

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicReviewer;
pub use openai::OpenAiGenerator;
