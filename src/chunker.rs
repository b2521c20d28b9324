//! # Chunk / Metadata Optimizer Module
//!
//! ## Purpose
//! Splits normalized text into byte-budgeted, word-boundary-aligned chunks
//! and computes per-document statistics and type frequencies.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized text, chunk byte budget
//! - **Output**: Numbered chunks, document metadata, type frequency counts
//! - **Guarantee**: Rejoining all chunks with single spaces reproduces the
//!   whitespace-unified normalized input exactly
//!
//! ## Key Features
//! - Greedy token accumulation tracking running UTF-8 byte size
//! - A single token larger than the budget is never split mid-token; it is
//!   kept whole as its own oversized chunk
//! - Case-insensitive document-type keyword frequencies over a fixed
//!   vocabulary (sentença, decisão, despacho, petição, certidão, laudo)
//! - Empty input yields zero chunks, not an error

use crate::utils::TextUtils;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed vocabulary for document-type frequency counting
const TYPE_VOCABULARY: &[&str] = &[
    "sentença",
    "decisão",
    "despacho",
    "petição",
    "certidão",
    "laudo",
];

/// A contiguous, word-boundary-aligned slice of normalized text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// 1-based chunk number
    pub number: usize,
    /// Chunk content (tokens rejoined with single spaces)
    pub content: String,
    /// UTF-8 byte size of the content
    pub byte_size: usize,
    /// True when the chunk is a single token exceeding the budget
    pub oversized: bool,
}

/// Per-document statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub total_bytes: usize,
    pub total_chars: usize,
    pub word_count: usize,
    pub line_count: usize,
    pub paragraph_count: usize,
}

/// Full optimizer output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub metadata: DocumentMetadata,
    pub type_frequencies: HashMap<String, usize>,
    pub chunks: Vec<Chunk>,
    pub total_chunks: usize,
}

/// Split normalized text into byte-budgeted chunks and compute statistics
pub fn optimize(normalized: &str, chunk_byte_budget: usize) -> OptimizationResult {
    let metadata = DocumentMetadata {
        total_bytes: normalized.len(),
        total_chars: normalized.chars().count(),
        word_count: TextUtils::word_count(normalized),
        line_count: normalized.lines().count(),
        paragraph_count: if normalized.trim().is_empty() {
            0
        } else {
            normalized.split("\n\n").filter(|p| !p.trim().is_empty()).count()
        },
    };

    let type_frequencies = count_type_frequencies(normalized);
    let chunks = chunk_text(normalized, chunk_byte_budget);
    let total_chunks = chunks.len();

    tracing::debug!(
        "Optimized document: {} words, {} chunks (budget {} bytes)",
        metadata.word_count,
        total_chunks,
        chunk_byte_budget
    );

    OptimizationResult {
        metadata,
        type_frequencies,
        chunks,
        total_chunks,
    }
}

/// Greedy token accumulation: close the current chunk when the next token
/// would exceed the budget
fn chunk_text(text: &str, budget: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(token);
            continue;
        }
        // +1 for the joining space
        if current.len() + 1 + token.len() > budget {
            push_chunk(&mut chunks, std::mem::take(&mut current), budget);
            current.push_str(token);
        } else {
            current.push(' ');
            current.push_str(token);
        }
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, current, budget);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, content: String, budget: usize) {
    let byte_size = content.len();
    chunks.push(Chunk {
        number: chunks.len() + 1,
        byte_size,
        oversized: byte_size > budget,
        content,
    });
}

/// Case-insensitive occurrence counts over the fixed type vocabulary
fn count_type_frequencies(text: &str) -> HashMap<String, usize> {
    let lowered = text.to_lowercase();
    TYPE_VOCABULARY
        .iter()
        .map(|kw| (kw.to_string(), lowered.matches(kw).count()))
        .collect()
}
