//! # Legal Document Processing Pipeline
//!
//! ## Overview
//! This library implements the document-processing core for Brazilian legal
//! case files: a deterministic pipeline that takes raw extracted text and
//! produces normalized text, structured legal entities, byte-bounded chunks,
//! and a set of AI-generated analyses persisted as a categorized artifact
//! bundle with cost and time telemetry.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `normalizer`: Ordered, idempotent text transforms
//! - `entities`: Regex-based legal entity extraction with deduplication
//! - `chunker`: Byte-budgeted greedy chunking and document statistics
//! - `classify`: Ordered rule table for document classification
//! - `cache`: Content-addressed analysis cache with TTL and LRU eviction
//! - `completion`: Narrow interface to the text-generation service
//! - `prompts`: Per-analysis prompt templates
//! - `pipeline`: Analysis orchestration with per-task failure isolation
//! - `artifacts`: Categorized output bundle and navigation index
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: A single text blob (output of an upstream extraction/OCR stage)
//! - **Output**: Seven category subdirectories of numbered artifact files plus
//!   one Markdown navigation index
//! - **Guarantees**: Deterministic normalization/extraction/chunking; partial
//!   analysis failures never abort a run
//!
//! ## Usage
//! ```rust,no_run
//! use legal_doc_pipeline::{Config, DocumentPipeline, RunContext};
//! use legal_doc_pipeline::cache::CacheStore;
//! use legal_doc_pipeline::completion::HttpCompletionService;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let cache = Arc::new(CacheStore::open(&config.cache).await?);
//!     let completion = Arc::new(HttpCompletionService::new(&config.completion)?);
//!     let pipeline = DocumentPipeline::new(config, cache, completion)?;
//!     let ctx = RunContext::new("./output");
//!     let bundle = pipeline.run("EXCELENTÍSSIMO SENHOR DOUTOR JUIZ...", ctx).await?;
//!     println!("Produced {} artifacts", bundle.files.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod artifacts;
pub mod cache;
pub mod chunker;
pub mod classify;
pub mod completion;
pub mod config;
pub mod entities;
pub mod errors;
pub mod normalizer;
pub mod pipeline;
pub mod prompts;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{PipelineError, Result};
pub use pipeline::{DocumentPipeline, RunContext, RunStats};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a processing run
pub type RunId = Uuid;

/// Raw document handed to the pipeline by the upstream extraction stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    /// Unique document identifier
    pub id: Uuid,
    /// Raw extracted text
    pub source_text: String,
    /// Size of the raw text in bytes
    pub byte_size: usize,
}

impl RawDocument {
    /// Wrap a raw text blob with a fresh identifier
    pub fn new(source_text: impl Into<String>) -> Self {
        let source_text = source_text.into();
        let byte_size = source_text.len();
        Self {
            id: Uuid::new_v4(),
            source_text,
            byte_size,
        }
    }
}

/// The analyses the pipeline can request from the completion service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    /// Document classification (type of judicial piece)
    Classification,
    /// Short plain-language summary
    ShortSummary,
    /// Chronology of events reconstructed from the text
    Chronology,
    /// Full structured analysis (JSON payload)
    StructuredAnalysis,
    /// Risk assessment, depends on the classification result
    RiskAnalysis,
    /// Executive summary for decision makers
    ExecutiveSummary,
    /// Critical-points triage
    CriticalPoints,
}

impl AnalysisKind {
    /// Every analysis kind the pipeline schedules, in dispatch order
    pub fn all() -> &'static [AnalysisKind] {
        &[
            AnalysisKind::Classification,
            AnalysisKind::ShortSummary,
            AnalysisKind::Chronology,
            AnalysisKind::StructuredAnalysis,
            AnalysisKind::ExecutiveSummary,
            AnalysisKind::CriticalPoints,
            AnalysisKind::RiskAnalysis,
        ]
    }

    /// Stable identifier used for content hashing and artifact names
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Classification => "classification",
            AnalysisKind::ShortSummary => "short_summary",
            AnalysisKind::Chronology => "chronology",
            AnalysisKind::StructuredAnalysis => "structured_analysis",
            AnalysisKind::RiskAnalysis => "risk_analysis",
            AnalysisKind::ExecutiveSummary => "executive_summary",
            AnalysisKind::CriticalPoints => "critical_points",
        }
    }

    /// Whether the completion output is expected to be a JSON payload
    pub fn expects_json(&self) -> bool {
        matches!(
            self,
            AnalysisKind::StructuredAnalysis | AnalysisKind::RiskAnalysis
        )
    }

    /// The analysis whose output this one consumes, if any
    pub fn depends_on(&self) -> Option<AnalysisKind> {
        match self {
            AnalysisKind::RiskAnalysis => Some(AnalysisKind::Classification),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cost/quality tier selecting which model serves an analysis task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheap model for classification, short summaries, chronology
    Fast,
    /// Premium model for structured analysis, risk, executive outputs
    Deep,
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelTier::Fast => f.write_str("fast"),
            ModelTier::Deep => f.write_str("deep"),
        }
    }
}

/// A scheduled analysis task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub kind: AnalysisKind,
    pub tier: ModelTier,
    pub depends_on: Option<AnalysisKind>,
}

/// Outcome of a single analysis task
///
/// Task-level failures are captured here rather than propagated; a run with
/// failed tasks still persists a complete bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub kind: AnalysisKind,
    pub tier: ModelTier,
    /// Analysis text on success, error description on failure
    pub outcome: std::result::Result<String, String>,
    /// True when the content was served from the analysis cache
    pub cached: bool,
    /// Wall-clock duration of the task in milliseconds
    pub duration_ms: u64,
    /// Token usage reported by the completion service (misses only)
    pub usage: Option<completion::TokenUsage>,
}

impl AnalysisResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Stages of a processing run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Created,
    Normalizing,
    ExtractingEntities,
    Classifying,
    Analyzing,
    Aggregating,
    Persisted,
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Created => "created",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::ExtractingEntities => "extracting_entities",
            PipelineStage::Classifying => "classifying",
            PipelineStage::Analyzing => "analyzing",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Failed => "failed",
        };
        f.write_str(name)
    }
}
