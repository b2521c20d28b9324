//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the document-processing pipeline, providing
//! the full error taxonomy and conversion utilities for all components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from pipeline components
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Validation, Extraction, External Service, Cache, Pipeline
//!
//! ## Key Features
//! - Stage-identified fatal errors for required pipeline stages
//! - Task-level errors that stay isolated inside analysis results
//! - Automatic conversion from I/O, JSON, HTTP and TOML errors
//! - Recoverability classification driving the retry policy

use crate::PipelineStage;
use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Comprehensive error types for the document-processing pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or empty input; fatal, never retried
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// A sub-extractor found nothing usable; non-fatal, logged
    #[error("Extraction produced nothing for category '{category}': {details}")]
    ExtractionWarning { category: String, details: String },

    /// Completion call failed after exhausting retries; task-level, isolated
    #[error("Completion service failed after {attempts} attempt(s): {details}")]
    ExternalService { details: String, attempts: u32 },

    /// A single completion call timed out; retryable up to the attempt bound
    #[error("Completion call timed out after {timeout_ms}ms")]
    CompletionTimeout { timeout_ms: u64 },

    /// Cache index points at missing or unreadable content; self-healing
    #[error("Cache corruption for hash '{hash}': {details}")]
    CacheCorruption { hash: String, details: String },

    /// Fatal, stage-identified failure that aborts the run
    #[error("Pipeline failed at stage '{stage}': {cause}")]
    Stage { stage: PipelineStage, cause: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Artifact persistence errors
    #[error("Failed to persist artifact '{path}': {details}")]
    ArtifactWrite { path: String, details: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing/serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        match self {
            PipelineError::CompletionTimeout { .. } => true,
            PipelineError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether this error aborts the whole run rather than one task
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation { .. }
                | PipelineError::Stage { .. }
                | PipelineError::Config { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Validation { .. } => "validation",
            PipelineError::ExtractionWarning { .. } => "extraction",
            PipelineError::ExternalService { .. } | PipelineError::CompletionTimeout { .. } => {
                "external_service"
            }
            PipelineError::CacheCorruption { .. } => "cache",
            PipelineError::Stage { .. } => "pipeline",
            PipelineError::Config { .. } => "configuration",
            PipelineError::ArtifactWrite { .. } => "artifacts",
            PipelineError::Io(_) => "io",
            PipelineError::Json(_) | PipelineError::Toml(_) => "serialization",
            PipelineError::Http(_) => "network",
            PipelineError::Internal { .. } => "generic",
        }
    }
}

/// Shorthand for a fatal stage failure
pub fn stage_error(stage: PipelineStage, cause: impl std::fmt::Display) -> PipelineError {
    PipelineError::Stage {
        stage,
        cause: cause.to_string(),
    }
}

#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::errors::PipelineError::Internal {
            message: $msg.to_string(),
        }
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::PipelineError::Internal {
            message: format!($fmt, $($arg)*),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($field:expr, $reason:expr) => {
        $crate::errors::PipelineError::Validation {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let timeout = PipelineError::CompletionTimeout { timeout_ms: 30_000 };
        assert!(timeout.is_recoverable());

        let validation = PipelineError::Validation {
            field: "source_text".to_string(),
            reason: "empty".to_string(),
        };
        assert!(!validation.is_recoverable());
        assert!(validation.is_fatal());
    }

    #[test]
    fn test_stage_error_names_stage() {
        let err = stage_error(PipelineStage::Normalizing, "boom");
        assert_eq!(err.category(), "pipeline");
        assert!(err.to_string().contains("normalizing"));
    }

    #[test]
    fn test_task_level_errors_are_not_fatal() {
        let err = PipelineError::ExternalService {
            details: "service unavailable".to_string(),
            attempts: 3,
        };
        assert!(!err.is_fatal());
        assert_eq!(err.category(), "external_service");
    }
}
