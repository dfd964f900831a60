// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # EvidenceStore — Hybrid Retrieval over an In-Memory Corpus
//!
//! Owns the chunked corpus and serves cited, scored retrieval results.
//! BM25 provides keyword recall, token-set Jaccard stands in for
//! embedding similarity (any embedding engine can be substituted behind
//! the same interface), and hybrid queries fuse the two orderings with
//! Reciprocal Rank Fusion so that incomparable score scales still
//! combine meaningfully.
//!
//! ## Anti-Hallucination Guarantee
//!
//! Absence of evidence is always representable as zero results, never as
//! a fabricated low-confidence result: an empty store returns an empty
//! result set for every strategy and every query, and only strictly
//! positive scores survive ranking.
//!
//! The corpus is memory-resident and append-only; BM25 statistics are
//! recomputed per call rather than kept in a persistent inverted index.
//! Call volume is query-time, not ingestion-time, and scoring stays
//! bounded by corpus size.

use parking_lot::RwLock;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::application::round4;
use crate::domain::{
    AuditLayer, AuditSink, Chunk, Citation, DocumentIngestion, Modality, RetrievalResponse,
    RetrievalResult, RetrievalStrategy,
};

/// Character budget for one text chunk.
const CHUNK_CHAR_BUDGET: usize = 500;
/// BM25 term-frequency saturation.
const BM25_K1: f64 = 1.5;
/// BM25 length normalization.
const BM25_B: f64 = 0.75;
/// RRF smoothing constant.
const RRF_K: f64 = 60.0;
/// Citation snippet length in characters.
const SNIPPET_CHARS: usize = 200;

#[derive(Default)]
struct CorpusIndex {
    chunks: Vec<Chunk>,
    doc_ids: HashSet<String>,
}

/// In-memory evidence store with hybrid retrieval.
pub struct EvidenceStore {
    audit: Arc<dyn AuditSink>,
    index: RwLock<CorpusIndex>,
}

impl EvidenceStore {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            audit,
            index: RwLock::new(CorpusIndex::default()),
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.index.read().chunks.len()
    }

    pub fn document_count(&self) -> usize {
        self.index.read().doc_ids.len()
    }

    /// Index every text block and described image of a document.
    ///
    /// Text blocks are split into sentence-respecting segments capped at
    /// the chunk budget; blocks under the budget are kept whole. Each
    /// image with a non-empty description becomes one additional chunk.
    /// Returns the number of chunks appended (0 for an empty document).
    pub fn index(&self, doc: &DocumentIngestion) -> usize {
        let mut added = 0usize;

        let mut index = self.index.write();
        for (block_idx, block) in doc.texts.iter().enumerate() {
            for segment in split_text(&block.text, CHUNK_CHAR_BUDGET) {
                index.chunks.push(Chunk {
                    chunk_id: format!("{}_t{}_{}", doc.doc_id, block_idx, added),
                    doc_id: doc.doc_id.clone(),
                    text: segment,
                    page: block.source_page,
                    bbox: block.bbox.clone(),
                    image_id: None,
                    modality: Modality::Text,
                });
                added += 1;
            }
        }

        for image in &doc.images {
            if !image.description.is_empty() {
                index.chunks.push(Chunk {
                    chunk_id: format!("{}_img_{}", doc.doc_id, image.image_id),
                    doc_id: doc.doc_id.clone(),
                    text: image.description.clone(),
                    page: image.page,
                    bbox: image.bbox.clone(),
                    image_id: Some(image.image_id.clone()),
                    modality: Modality::Image,
                });
                added += 1;
            }
        }

        index.doc_ids.insert(doc.doc_id.clone());

        self.audit.record(
            AuditLayer::Knowledge,
            "document_indexed",
            json!({ "doc_id": doc.doc_id, "chunks_added": added }),
            None,
            "system",
        );

        added
    }

    /// Retrieve the top-k chunks for a query under the given strategy.
    ///
    /// Results are filtered to strictly positive scores before
    /// truncation; ties are broken by store insertion order.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        strategy: RetrievalStrategy,
    ) -> RetrievalResponse {
        let index = self.index.read();

        if index.chunks.is_empty() {
            self.audit.record(
                AuditLayer::Knowledge,
                "retrieval",
                json!({
                    "query": query,
                    "strategy": strategy.to_string(),
                    "results_count": 0,
                    "top_score": 0.0,
                }),
                None,
                "system",
            );
            return RetrievalResponse::empty(query, strategy);
        }

        let scores = match strategy {
            RetrievalStrategy::Bm25 => bm25_scores(&index.chunks, query),
            RetrievalStrategy::Vector => jaccard_scores(&index.chunks, query),
            RetrievalStrategy::Hybrid => {
                let bm25 = bm25_scores(&index.chunks, query);
                let vector = jaccard_scores(&index.chunks, query);
                rrf_fuse(
                    &[rank_positive(&bm25), rank_positive(&vector)],
                    index.chunks.len(),
                )
            }
        };

        let results: Vec<RetrievalResult> = rank_positive(&scores)
            .into_iter()
            .take(top_k)
            .map(|i| {
                let chunk = &index.chunks[i];
                let citation = Citation {
                    doc_id: chunk.doc_id.clone(),
                    page: chunk.page,
                    bbox: chunk.bbox.clone(),
                    image_id: chunk.image_id.clone(),
                    snippet: chunk.text.chars().take(SNIPPET_CHARS).collect(),
                };
                RetrievalResult {
                    chunk_id: chunk.chunk_id.clone(),
                    text: chunk.text.clone(),
                    score: round4(scores[i]),
                    citations: vec![citation],
                    modality: chunk.modality,
                }
            })
            .collect();

        let response = RetrievalResponse {
            query: query.to_string(),
            results,
            strategy,
        };

        self.audit.record(
            AuditLayer::Knowledge,
            "retrieval",
            json!({
                "query": query,
                "strategy": strategy.to_string(),
                "results_count": response.results.len(),
                "top_score": response.top_score(),
            }),
            None,
            "system",
        );

        response
    }
}

// ── scoring ──

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Classic BM25 with per-call IDF over the whole chunk set, normalized
/// by average chunk length in whitespace-delimited terms.
fn bm25_scores(chunks: &[Chunk], query: &str) -> Vec<f64> {
    let query_terms = tokenize(query);
    if query_terms.is_empty() {
        return vec![0.0; chunks.len()];
    }

    let n = chunks.len();
    let chunk_terms: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for terms in &chunk_terms {
        let unique: HashSet<&str> = terms.iter().map(String::as_str).collect();
        for term in &query_terms {
            if unique.contains(term.as_str()) {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }
    }

    let avg_dl =
        chunk_terms.iter().map(Vec::len).sum::<usize>() as f64 / n.max(1) as f64;

    chunk_terms
        .iter()
        .map(|terms| {
            let dl = terms.len() as f64;
            let mut term_counts: HashMap<&str, usize> = HashMap::new();
            for term in terms {
                *term_counts.entry(term.as_str()).or_insert(0) += 1;
            }

            let mut score = 0.0;
            for term in &query_terms {
                let tf = term_counts.get(term.as_str()).copied().unwrap_or(0) as f64;
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                if tf == 0.0 || df == 0.0 {
                    continue;
                }
                let idf = ((n as f64 - df + 0.5) / (df + 0.5) + 1.0).ln();
                let numerator = tf * (BM25_K1 + 1.0);
                let denominator = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avg_dl);
                score += idf * numerator / denominator;
            }
            score
        })
        .collect()
}

/// Token-set Jaccard similarity, the lightweight proxy for embedding
/// cosine similarity.
fn jaccard_scores(chunks: &[Chunk], query: &str) -> Vec<f64> {
    let query_terms: HashSet<String> = tokenize(query).into_iter().collect();

    chunks
        .iter()
        .map(|chunk| {
            let chunk_terms: HashSet<String> = tokenize(&chunk.text).into_iter().collect();
            if query_terms.is_empty() || chunk_terms.is_empty() {
                return 0.0;
            }
            let intersection = query_terms.intersection(&chunk_terms).count();
            let union = query_terms.union(&chunk_terms).count();
            intersection as f64 / union as f64
        })
        .collect()
}

/// Indices of strictly positive scores, ordered by descending score.
/// The sort is stable, so equal scores keep store insertion order.
fn rank_positive(scores: &[f64]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..scores.len()).filter(|&i| scores[i] > 0.0).collect();
    ranked.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Reciprocal Rank Fusion: each chunk's fused score is the sum of
/// `1 / (k + rank)` over every ranked list it appears in, rank 1-based
/// within that list. Chunks absent from a list contribute nothing
/// from it.
fn rrf_fuse(ranked_lists: &[Vec<usize>], chunk_count: usize) -> Vec<f64> {
    let mut fused = vec![0.0; chunk_count];
    for list in ranked_lists {
        for (rank0, &chunk_idx) in list.iter().enumerate() {
            fused[chunk_idx] += 1.0 / (RRF_K + (rank0 + 1) as f64);
        }
    }
    fused
}

// ── chunking ──

/// Split text into segments respecting sentence boundaries, capped at
/// `max_chars` characters. Text under the budget is kept whole.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let flattened = text.replace('\n', " ");
    let mut segments: Vec<String> = Vec::new();
    let mut current = String::new();

    for sentence in flattened.split(". ") {
        let candidate = if current.is_empty() {
            sentence.trim().to_string()
        } else {
            format!("{current}. {sentence}").trim().to_string()
        };

        if candidate.chars().count() > max_chars && !current.is_empty() {
            segments.push(current.trim().to_string());
            current = sentence.to_string();
        } else {
            current = candidate;
        }
    }

    if !current.trim().is_empty() {
        segments.push(current.trim().to_string());
    }

    if segments.is_empty() {
        vec![text.to_string()]
    } else {
        segments
    }
}
