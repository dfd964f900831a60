// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Content extraction domain interface.
//!
//! Turning a source file into text blocks and image descriptors is an
//! external collaborator's job (PDF parsing, OCR, vision captioning all
//! stay outside this crate). The pipeline only requires the contract
//! below: a missing path is an error, a document with no extractable
//! text is a valid empty outcome.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::document::DocumentIngestion;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Document not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extracts structured content from a source file.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<DocumentIngestion, ExtractError>;
}
