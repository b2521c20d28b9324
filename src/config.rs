//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration management for the document-processing pipeline,
//! supporting TOML files and environment variables with validation and
//! type-safe access to all settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Type checking, range validation, tier-map completeness
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (highest priority)
//! 2. Configuration files
//! 3. Default values (lowest priority)
//!
//! ## Usage
//! ```rust,no_run
//! use legal_doc_pipeline::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("Chunk budget: {} bytes", config.pipeline.chunk_byte_budget);
//! ```

use crate::errors::{PipelineError, Result};
use crate::{AnalysisKind, ModelTier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pipeline behavior
    pub pipeline: PipelineConfig,
    /// Analysis cache settings
    pub cache: CacheConfig,
    /// Completion service settings
    pub completion: CompletionConfig,
    /// Per-tier token pricing for cost telemetry
    pub pricing: PricingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Byte budget per chunk
    pub chunk_byte_budget: usize,
    /// Context window size (chars) captured around each extracted entity
    pub entity_context_chars: usize,
    /// Maximum characters of normalized text embedded into prompts
    pub prompt_excerpt_chars: usize,
    /// Tier assignment per analysis kind; configuration, not a hard rule
    pub tiers: HashMap<AnalysisKind, ModelTier>,
}

/// Analysis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory (index file plus one content file per hash)
    pub directory: PathBuf,
    /// Maximum number of cache entries
    pub max_entries: usize,
    /// Time to live for cache entries (hours)
    pub ttl_hours: i64,
    /// Percentage of least-recently-accessed entries evicted in one batch
    pub eviction_percent: u8,
    /// Gzip-compress content files
    pub enable_compression: bool,
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of an OpenAI-compatible chat-completions endpoint
    pub base_url: String,
    /// API key (usually supplied via environment)
    pub api_key: Option<String>,
    /// Model identifier served to fast-tier tasks
    pub fast_model: String,
    /// Model identifier served to deep-tier tasks
    pub deep_model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens per completion
    pub max_tokens: u32,
    /// Per-call timeout in seconds
    pub timeout_seconds: u64,
    /// Bounded retry attempts per call
    pub retry_attempts: u32,
    /// Base backoff delay in milliseconds (doubles per attempt)
    pub retry_base_delay_ms: u64,
}

/// Token pricing per tier, in USD per 1000 tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub fast_per_1k_tokens: f64,
    pub deep_per_1k_tokens: f64,
}

impl PricingConfig {
    /// Estimated cost of a call given its total token count and tier
    pub fn cost_for(&self, tier: ModelTier, total_tokens: u64) -> f64 {
        let rate = match tier {
            ModelTier::Fast => self.fast_per_1k_tokens,
            ModelTier::Deep => self.deep_per_1k_tokens,
        };
        rate * (total_tokens as f64 / 1000.0)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable structured JSON logging
    pub json_format: bool,
}

impl Config {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            let mut config = Self::default();
            config.apply_env_overrides()?;
            config.validate()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("Failed to read config file {:?}: {}", path, e),
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| PipelineError::Config {
            message: format!("Failed to parse config file {:?}: {}", path, e),
        })?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("LEGAL_DOC_COMPLETION_URL") {
            self.completion.base_url = url;
        }
        if let Ok(api_key) = std::env::var("LEGAL_DOC_API_KEY") {
            self.completion.api_key = Some(api_key);
        }
        if let Ok(dir) = std::env::var("LEGAL_DOC_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }
        if let Ok(budget) = std::env::var("LEGAL_DOC_CHUNK_BUDGET") {
            self.pipeline.chunk_byte_budget =
                budget.parse().map_err(|_| PipelineError::Config {
                    message: "Invalid byte budget in LEGAL_DOC_CHUNK_BUDGET".to_string(),
                })?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.chunk_byte_budget == 0 {
            return Err(PipelineError::Validation {
                field: "pipeline.chunk_byte_budget".to_string(),
                reason: "Chunk byte budget must be greater than zero".to_string(),
            });
        }

        if self.cache.max_entries == 0 {
            return Err(PipelineError::Validation {
                field: "cache.max_entries".to_string(),
                reason: "Cache capacity must be greater than zero".to_string(),
            });
        }

        if self.cache.eviction_percent == 0 || self.cache.eviction_percent > 100 {
            return Err(PipelineError::Validation {
                field: "cache.eviction_percent".to_string(),
                reason: "Eviction percentage must be in 1..=100".to_string(),
            });
        }

        if self.completion.retry_attempts == 0 {
            return Err(PipelineError::Validation {
                field: "completion.retry_attempts".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        for kind in AnalysisKind::all() {
            if !self.pipeline.tiers.contains_key(kind) {
                return Err(PipelineError::Validation {
                    field: "pipeline.tiers".to_string(),
                    reason: format!("Missing tier assignment for analysis '{}'", kind),
                });
            }
        }

        Ok(())
    }

    /// Resolve the model identifier for a tier
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.completion.fast_model,
            ModelTier::Deep => &self.completion.deep_model,
        }
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PipelineError::Config {
            message: format!("Failed to serialize config to TOML: {}", e),
        })
    }
}

/// Default cheap/premium tier assignment; overridable per deployment
fn default_tiers() -> HashMap<AnalysisKind, ModelTier> {
    let mut tiers = HashMap::new();
    tiers.insert(AnalysisKind::Classification, ModelTier::Fast);
    tiers.insert(AnalysisKind::ShortSummary, ModelTier::Fast);
    tiers.insert(AnalysisKind::Chronology, ModelTier::Fast);
    tiers.insert(AnalysisKind::StructuredAnalysis, ModelTier::Deep);
    tiers.insert(AnalysisKind::RiskAnalysis, ModelTier::Deep);
    tiers.insert(AnalysisKind::ExecutiveSummary, ModelTier::Deep);
    tiers.insert(AnalysisKind::CriticalPoints, ModelTier::Deep);
    tiers
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig {
                chunk_byte_budget: 8_000,
                entity_context_chars: 80,
                prompt_excerpt_chars: 12_000,
                tiers: default_tiers(),
            },
            cache: CacheConfig {
                directory: PathBuf::from("./data/analysis_cache"),
                max_entries: 1_000,
                ttl_hours: 24,
                eviction_percent: 10,
                enable_compression: true,
            },
            completion: CompletionConfig {
                base_url: "http://127.0.0.1:8080/v1".to_string(),
                api_key: None,
                fast_model: "fast-general".to_string(),
                deep_model: "deep-legal".to_string(),
                temperature: 0.2,
                max_tokens: 4_000,
                timeout_seconds: 60,
                retry_attempts: 3,
                retry_base_delay_ms: 500,
            },
            pricing: PricingConfig {
                fast_per_1k_tokens: 0.000_5,
                deep_per_1k_tokens: 0.015,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}
