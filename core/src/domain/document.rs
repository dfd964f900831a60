// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Document ingestion value objects.
//!
//! A [`DocumentIngestion`] is the structured output of a content
//! extractor: plain text blocks and image descriptors, each grounded
//! with page numbers and optional bounding boxes. Extraction itself is
//! an external collaborator (see [`crate::domain::extract`]); the
//! pipeline only consumes the extracted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::short_id;

/// Page-relative rectangle locating a text block or image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub page: u32,
}

/// One extracted text block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub source_page: u32,
}

fn default_confidence() -> f64 {
    1.0
}

impl ExtractedText {
    pub fn new(text: impl Into<String>, source_page: u32) -> Self {
        Self {
            text: text.into(),
            confidence: 1.0,
            bbox: None,
            source_page,
        }
    }
}

/// One extracted image descriptor. The description is what gets indexed;
/// raw image bytes never enter the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    pub image_id: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub description: String,
}

impl ExtractedImage {
    pub fn new(page: u32, description: impl Into<String>) -> Self {
        Self {
            image_id: short_id(),
            page,
            bbox: None,
            description: description.into(),
        }
    }
}

/// A fully extracted document, ready for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentIngestion {
    pub doc_id: String,
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub texts: Vec<ExtractedText>,
    #[serde(default)]
    pub images: Vec<ExtractedImage>,
    pub ingested_at: DateTime<Utc>,
}

impl DocumentIngestion {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            doc_id: short_id(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            pages: 0,
            texts: Vec::new(),
            images: Vec::new(),
            ingested_at: Utc::now(),
        }
    }

    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_texts(mut self, texts: Vec<ExtractedText>) -> Self {
        self.texts = texts;
        self
    }

    pub fn with_images(mut self, images: Vec<ExtractedImage>) -> Self {
        self.images = images;
        self
    }
}
