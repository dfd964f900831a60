// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Plain-text content extractor.
//!
//! Demo-grade implementation of the extraction collaborator: reads a
//! UTF-8 text file and turns blank-line-separated paragraphs into text
//! blocks. PDF parsing, OCR, and image captioning belong to external
//! extractors implementing the same trait.

use std::path::Path;

use crate::domain::{ContentExtractor, DocumentIngestion, ExtractError, ExtractedText};

/// Extracts paragraph blocks from UTF-8 text files.
#[derive(Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ContentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<DocumentIngestion, ExtractError> {
        if !path.exists() {
            return Err(ExtractError::NotFound(path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        // Absence of extractable text is a valid outcome, not an error.
        let texts: Vec<ExtractedText> = raw
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(|block| ExtractedText::new(block, 0))
            .collect();

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(DocumentIngestion::new(filename, "text/plain")
            .with_pages(1)
            .with_texts(texts))
    }
}
