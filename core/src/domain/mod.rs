// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Immutable value objects and provider interfaces for the Verdict
//! decision pipeline. Every value here is safe to serialize into the
//! audit log: no field carries raw credentials or document bytes.

pub mod audit;
pub mod decision;
pub mod document;
pub mod evidence;
pub mod extract;
pub mod feedback;
pub mod llm;
pub mod policy;

pub use audit::*;
pub use decision::*;
pub use document::*;
pub use evidence::*;
pub use extract::*;
pub use feedback::*;
pub use llm::*;
pub use policy::*;

/// Short hex identifier for documents and images (16 chars of a v4 UUID).
///
/// Decision/feedback/adjustment identifiers use full typed UUIDs; document
/// and image identifiers stay short because they are embedded into chunk
/// identifiers and citations that humans read in the audit trail.
pub fn short_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..16].to_string()
}
