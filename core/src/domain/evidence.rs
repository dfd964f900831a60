// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Evidence and retrieval value objects.
//!
//! A [`Chunk`] is the smallest indexed unit of evidence; chunks are
//! append-only and never mutated after indexing. A [`RetrievalResult`]
//! is one scored chunk with its mandatory citation grounding; a result
//! with zero citations is not a valid value in this domain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::document::BoundingBox;

/// Whether a chunk came from a text block or an image description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Image,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Text => write!(f, "text"),
            Modality::Image => write!(f, "image"),
        }
    }
}

/// Smallest unit of indexed evidence. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub text: String,
    pub page: u32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub image_id: Option<String>,
    pub modality: Modality,
}

/// Pointer from a retrieval result back to its source location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub page: u32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub snippet: String,
}

/// One scored, cited retrieval hit.
///
/// Scores are comparable across calls for the same query only; they are
/// not globally normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub text: String,
    pub score: f64,
    pub citations: Vec<Citation>,
    pub modality: Modality,
}

/// Retrieval strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    Bm25,
    Vector,
    Hybrid,
}

impl fmt::Display for RetrievalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStrategy::Bm25 => write!(f, "bm25"),
            RetrievalStrategy::Vector => write!(f, "vector"),
            RetrievalStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bm25" => Ok(RetrievalStrategy::Bm25),
            "vector" => Ok(RetrievalStrategy::Vector),
            "hybrid" => Ok(RetrievalStrategy::Hybrid),
            other => Err(format!("unknown retrieval strategy: {other}")),
        }
    }
}

/// Ordered result set for one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub query: String,
    pub results: Vec<RetrievalResult>,
    pub strategy: RetrievalStrategy,
}

impl RetrievalResponse {
    pub fn empty(query: impl Into<String>, strategy: RetrievalStrategy) -> Self {
        Self {
            query: query.into(),
            results: Vec::new(),
            strategy,
        }
    }

    /// Score of the best hit, 0.0 when the result set is empty.
    pub fn top_score(&self) -> f64 {
        self.results.first().map(|r| r.score).unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
