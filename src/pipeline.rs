//! # Analysis Orchestrator Module
//!
//! ## Purpose
//! Coordinates the complete processing run: validation, normalization,
//! entity extraction, chunking, classification, concurrent AI analyses (via
//! cache and completion service) and artifact persistence.
//!
//! ## Input/Output Specification
//! - **Input**: Raw text blob, run context (output directory)
//! - **Output**: Persisted `ArtifactBundle`, or a fatal stage-identified error
//! - **Workflow**: Created → Normalizing → ExtractingEntities → Classifying →
//!   Analyzing (concurrent) → Aggregating → Persisted
//!
//! ## Key Features
//! - Settle-all concurrency: independent analysis tasks are dispatched as a
//!   batch and every task resolves; one failure never rejects the batch
//! - Dependency-bearing tasks (risk analysis needs the classification
//!   output) run only after their dependency resolves
//! - Content-addressed cache check and write-through per task
//! - Structured outputs validated as JSON with a regex best-effort fallback
//! - Per-task failure isolation: a failed task is recorded in its result and
//!   the run still reaches the persisted state
//! - Cost/time telemetry per stage and per task

use crate::artifacts::{self, ArtifactBundle, BundleInputs};
use crate::cache::CacheStore;
use crate::chunker::{self, OptimizationResult};
use crate::classify::{self, DocumentClass};
use crate::completion::{
    complete_with_retry, CompletionOptions, CompletionService, RetryPolicy,
};
use crate::config::Config;
use crate::entities::{EntityExtractor, ExtractionReport};
use crate::errors::{stage_error, PipelineError, Result};
use crate::normalizer::{NormalizedText, TextNormalizer};
use crate::prompts::{self, PromptContext};
use crate::utils::Timer;
use crate::{AnalysisKind, AnalysisResult, AnalysisTask, PipelineStage, RunId};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Context for one processing run
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root directory for the artifact bundle
    pub output_dir: PathBuf,
    /// Document identifier carried into telemetry
    pub document_id: Uuid,
}

impl RunContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            document_id: Uuid::new_v4(),
        }
    }
}

/// Telemetry for one analysis task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTelemetry {
    pub kind: AnalysisKind,
    pub tier: crate::ModelTier,
    pub cached: bool,
    pub success: bool,
    pub duration_ms: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

/// Machine-readable record of one task failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: AnalysisKind,
    pub error: String,
}

/// Run statistics persisted into the processing-statistics artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: RunId,
    pub document_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub final_stage: PipelineStage,
    pub stage_timings_ms: HashMap<String, u64>,
    pub total_duration_ms: u64,
    pub tasks: Vec<TaskTelemetry>,
    pub failures: Vec<TaskFailure>,
    pub cached_tasks: usize,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    pub entity_count: usize,
    pub chunk_count: usize,
}

/// The document-processing orchestrator
///
/// The cache store and completion service are injected so tests can
/// substitute a tempdir-backed cache and a scripted service.
pub struct DocumentPipeline {
    config: Config,
    normalizer: TextNormalizer,
    extractor: EntityExtractor,
    cache: Arc<CacheStore>,
    completion: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    json_fallback: Regex,
}

impl DocumentPipeline {
    /// Create a pipeline from configuration and injected collaborators
    pub fn new(
        config: Config,
        cache: Arc<CacheStore>,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        config.validate()?;
        let normalizer = TextNormalizer::new()?;
        let extractor = EntityExtractor::new(&config.pipeline)?;
        let retry = RetryPolicy::from_config(&config.completion);
        let json_fallback = Regex::new(r"(?s)\{.*\}")
            .map_err(|e| crate::internal_error!("Invalid fallback pattern: {}", e))?;

        Ok(Self {
            config,
            normalizer,
            extractor,
            cache,
            completion,
            retry,
            json_fallback,
        })
    }

    /// Execute a complete run and persist the artifact bundle
    ///
    /// Task-level analysis failures are isolated into their results; only a
    /// failure in a required stage (validation, normalization, extraction)
    /// aborts the run.
    pub async fn run(&self, raw_text: &str, ctx: RunContext) -> Result<ArtifactBundle> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let run_timer = Timer::new("pipeline_run");
        let mut stage_timings: HashMap<String, u64> = HashMap::new();

        tracing::info!("Run {} created for document {}", run_id, ctx.document_id);

        // Required stage: input validation
        if raw_text.trim().is_empty() {
            return Err(PipelineError::Validation {
                field: "raw_text".to_string(),
                reason: "input text is empty".to_string(),
            });
        }

        // Required stage: normalization
        let timer = Timer::new("normalizing");
        let normalized = self.normalizer.normalize(raw_text);
        stage_timings.insert(PipelineStage::Normalizing.to_string(), timer.stop());
        if normalized.text.is_empty() {
            return Err(stage_error(
                PipelineStage::Normalizing,
                "normalization reduced the document to nothing",
            ));
        }
        tracing::info!(
            "Normalized {} -> {} bytes ({:.1}% reduction)",
            normalized.stats.original_length,
            normalized.stats.final_length,
            normalized.stats.reduction_percent
        );

        // Required stage: entity extraction
        let timer = Timer::new("extracting_entities");
        let extraction = self.extractor.extract_all(&normalized.text);
        stage_timings.insert(PipelineStage::ExtractingEntities.to_string(), timer.stop());

        // Chunking and document statistics
        let optimization = chunker::optimize(&normalized.text, self.config.pipeline.chunk_byte_budget);

        // Classification via the ordered rule table
        let timer = Timer::new("classifying");
        let document_class = classify::classify(&normalized.text);
        stage_timings.insert(PipelineStage::Classifying.to_string(), timer.stop());
        tracing::info!("Document classified as '{}'", document_class.label);

        // Concurrent analyses
        let timer = Timer::new("analyzing");
        let results = self
            .run_analyses(&normalized, &extraction, &document_class)
            .await;
        stage_timings.insert(PipelineStage::Analyzing.to_string(), timer.stop());

        // Aggregation of telemetry
        let timer = Timer::new("aggregating");
        let mut stats = self.aggregate(
            run_id,
            ctx.document_id,
            started_at,
            stage_timings,
            &results,
            &extraction,
            &optimization,
        );
        stats.stage_timings_ms.insert(PipelineStage::Aggregating.to_string(), timer.stop());

        stats.final_stage = PipelineStage::Persisted;
        stats.finished_at = Some(Utc::now());
        stats.total_duration_ms = run_timer.elapsed_ms();

        // Persist the bundle; failures here are fatal for the run
        let inputs = BundleInputs {
            run_id,
            normalized: &normalized,
            extraction: &extraction,
            optimization: &optimization,
            document_class: &document_class,
            results: &results,
            stats: &stats,
        };
        let bundle = artifacts::write_bundle(&ctx.output_dir, &inputs)
            .await
            .map_err(|e| stage_error(PipelineStage::Aggregating, e))?;

        run_timer.stop();
        tracing::info!(
            "Run {} persisted: {} artifacts, {} tasks ({} cached, {} failed), {:.4} USD",
            run_id,
            bundle.files.len(),
            stats.tasks.len(),
            stats.cached_tasks,
            stats.failures.len(),
            stats.estimated_cost_usd
        );

        Ok(bundle)
    }

    /// Build the task table from the configured tier map
    fn build_tasks(&self) -> Vec<AnalysisTask> {
        AnalysisKind::all()
            .iter()
            .map(|&kind| AnalysisTask {
                kind,
                tier: self.config.pipeline.tiers[&kind],
                depends_on: kind.depends_on(),
            })
            .collect()
    }

    /// Dispatch independent tasks concurrently, then dependency-bearing ones
    async fn run_analyses(
        &self,
        normalized: &NormalizedText,
        extraction: &ExtractionReport,
        document_class: &DocumentClass,
    ) -> Vec<AnalysisResult> {
        let base_ctx = PromptContext::build(
            &normalized.text,
            extraction,
            &document_class.label,
            self.config.pipeline.prompt_excerpt_chars,
        );

        let tasks = self.build_tasks();
        let (independent, dependent): (Vec<_>, Vec<_>) =
            tasks.into_iter().partition(|t| t.depends_on.is_none());

        // Settle-all: every future resolves to a result, never rejects
        let first_wave = futures::future::join_all(
            independent
                .iter()
                .map(|task| self.run_task(task.clone(), base_ctx.clone(), normalized)),
        )
        .await;

        let mut results = first_wave;

        for task in dependent {
            let Some(dependency) = task.depends_on else {
                continue;
            };
            let dependency_output = results
                .iter()
                .find(|r| r.kind == dependency)
                .and_then(|r| r.outcome.as_ref().ok().cloned())
                // A failed dependency degrades to the heuristic label so the
                // dependent task still runs
                .unwrap_or_else(|| document_class.label.clone());

            let mut ctx = base_ctx.clone();
            ctx.dependency_output = Some(dependency_output);
            results.push(self.run_task(task, ctx, normalized).await);
        }

        results
    }

    /// Run one analysis task inside its own error boundary
    async fn run_task(
        &self,
        task: AnalysisTask,
        ctx: PromptContext,
        normalized: &NormalizedText,
    ) -> AnalysisResult {
        let timer = Timer::new(task.kind.as_str());
        let hash = CacheStore::content_hash(&normalized.text, task.kind);

        match self.cache.get(&hash).await {
            Ok(Some(payload)) => {
                tracing::debug!("Cache hit for task '{}'", task.kind);
                return AnalysisResult {
                    kind: task.kind,
                    tier: task.tier,
                    outcome: Ok(payload),
                    cached: true,
                    duration_ms: timer.stop(),
                    usage: None,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!("Cache read failed for task '{}': {}", task.kind, e);
            }
        }

        let (system, user) = prompts::render(task.kind, &ctx);
        let options = CompletionOptions {
            model: self.config.model_for(task.tier).to_string(),
            temperature: self.config.completion.temperature,
            max_tokens: self.config.completion.max_tokens,
            system_prompt: Some(system),
        };

        let outcome =
            complete_with_retry(self.completion.as_ref(), &user, &options, &self.retry).await;

        match outcome {
            Ok(completion) => {
                let content = self.validate_output(task.kind, completion.text);
                if let Err(e) = self.cache.put(&hash, &content).await {
                    // Cache errors never fail the task
                    tracing::warn!("Cache write failed for task '{}': {}", task.kind, e);
                }
                AnalysisResult {
                    kind: task.kind,
                    tier: task.tier,
                    outcome: Ok(content),
                    cached: false,
                    duration_ms: timer.stop(),
                    usage: Some(completion.usage),
                }
            }
            Err(e) => {
                tracing::error!("Task '{}' failed: {}", task.kind, e);
                AnalysisResult {
                    kind: task.kind,
                    tier: task.tier,
                    outcome: Err(e.to_string()),
                    cached: false,
                    duration_ms: timer.stop(),
                    usage: None,
                }
            }
        }
    }

    /// Validate a completion against the expected output shape
    ///
    /// Structured kinds must be JSON; when direct parsing fails, a regex
    /// best-effort extractor pulls the first JSON object out of surrounding
    /// prose. Unsalvageable output is kept verbatim as best effort.
    fn validate_output(&self, kind: AnalysisKind, text: String) -> String {
        if !kind.expects_json() {
            return text;
        }

        if serde_json::from_str::<serde_json::Value>(text.trim()).is_ok() {
            return text.trim().to_string();
        }

        if let Some(candidate) = self.json_fallback.find(&text) {
            if serde_json::from_str::<serde_json::Value>(candidate.as_str()).is_ok() {
                tracing::debug!(
                    "Recovered JSON payload for '{}' from surrounding prose",
                    kind
                );
                return candidate.as_str().to_string();
            }
        }

        tracing::warn!("Task '{}' returned non-JSON output, keeping verbatim", kind);
        text
    }

    #[allow(clippy::too_many_arguments)]
    fn aggregate(
        &self,
        run_id: RunId,
        document_id: Uuid,
        started_at: DateTime<Utc>,
        stage_timings_ms: HashMap<String, u64>,
        results: &[AnalysisResult],
        extraction: &ExtractionReport,
        optimization: &OptimizationResult,
    ) -> RunStats {
        let mut tasks = Vec::new();
        let mut failures = Vec::new();
        let mut total_tokens = 0u64;
        let mut estimated_cost_usd = 0f64;
        let mut cached_tasks = 0usize;

        for result in results {
            let task_tokens = result.usage.as_ref().map(|u| u.total_tokens).unwrap_or(0);
            let cost = self.config.pricing.cost_for(result.tier, task_tokens);
            total_tokens += task_tokens;
            estimated_cost_usd += cost;
            if result.cached {
                cached_tasks += 1;
            }
            if let Err(error) = &result.outcome {
                failures.push(TaskFailure {
                    kind: result.kind,
                    error: error.clone(),
                });
            }
            tasks.push(TaskTelemetry {
                kind: result.kind,
                tier: result.tier,
                cached: result.cached,
                success: result.is_success(),
                duration_ms: result.duration_ms,
                total_tokens: task_tokens,
                estimated_cost_usd: cost,
            });
        }

        RunStats {
            run_id,
            document_id,
            started_at,
            finished_at: None,
            final_stage: PipelineStage::Aggregating,
            stage_timings_ms,
            total_duration_ms: 0,
            tasks,
            failures,
            cached_tasks,
            total_tokens,
            estimated_cost_usd,
            entity_count: extraction.stats.total_entities,
            chunk_count: optimization.total_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::completion::ScriptedCompletionService;
    use tempfile::TempDir;

    fn test_config(cache_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.directory = cache_dir.path().to_path_buf();
        config.completion.retry_attempts = 1;
        config.completion.retry_base_delay_ms = 1;
        config
    }

    async fn pipeline_with(service: ScriptedCompletionService, cache_dir: &TempDir) -> DocumentPipeline {
        let config = test_config(cache_dir);
        let cache = Arc::new(CacheStore::open(&config.cache).await.unwrap());
        DocumentPipeline::new(config, cache, Arc::new(service)).unwrap()
    }

    const SAMPLE: &str = "SENTENÇA\n\nProcesso 1234567-89.2023.8.26.0100. Autor: João da Silva. \
        Julgo procedente o pedido e condeno a ré ao pagamento de R$ 10.000,50.";

    #[tokio::test]
    async fn test_empty_input_is_fatal_validation_error() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let pipeline = pipeline_with(ScriptedCompletionService::new(), &dir).await;
        let err = pipeline
            .run("   \n  ", RunContext::new(out.path()))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.category(), "validation");
    }

    #[tokio::test]
    async fn test_task_table_tiers_follow_config() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(ScriptedCompletionService::new(), &dir).await;
        let tasks = pipeline.build_tasks();
        assert_eq!(tasks.len(), AnalysisKind::all().len());
        let risk = tasks.iter().find(|t| t.kind == AnalysisKind::RiskAnalysis).unwrap();
        assert_eq!(risk.depends_on, Some(AnalysisKind::Classification));
        assert_eq!(risk.tier, crate::ModelTier::Deep);
    }

    #[tokio::test]
    async fn test_json_validation_with_fallback() {
        let dir = TempDir::new().unwrap();
        let pipeline = pipeline_with(ScriptedCompletionService::new(), &dir).await;

        let clean = pipeline.validate_output(
            AnalysisKind::StructuredAnalysis,
            r#"{"tipo_documento": "sentença"}"#.to_string(),
        );
        assert!(serde_json::from_str::<serde_json::Value>(&clean).is_ok());

        let wrapped = pipeline.validate_output(
            AnalysisKind::RiskAnalysis,
            "Segue a análise:\n{\"nivel_risco\": \"alto\", \"fatores\": []}\nEspero ter ajudado."
                .to_string(),
        );
        assert!(serde_json::from_str::<serde_json::Value>(&wrapped).is_ok());

        // Prose stays verbatim for non-structured kinds
        let prose = pipeline.validate_output(AnalysisKind::ShortSummary, "um resumo".to_string());
        assert_eq!(prose, "um resumo");
    }

    #[tokio::test]
    async fn test_second_run_hits_cache() {
        let dir = TempDir::new().unwrap();
        let out1 = TempDir::new().unwrap();
        let out2 = TempDir::new().unwrap();
        let service = ScriptedCompletionService::new().with_response("TAREFA", "análise gerada");
        let pipeline = pipeline_with(service, &dir).await;

        pipeline.run(SAMPLE, RunContext::new(out1.path())).await.unwrap();

        // Same content, fresh run: every task should come from cache
        let stats_probe = pipeline
            .run(SAMPLE, RunContext::new(out2.path()))
            .await
            .unwrap();
        assert!(stats_probe.files.iter().any(|f| f.file_name.contains("estatisticas_processamento")));

        let normalized = pipeline.normalizer.normalize(SAMPLE);
        for kind in AnalysisKind::all() {
            let hash = CacheStore::content_hash(&normalized.text, *kind);
            assert!(pipeline.cache.get(&hash).await.unwrap().is_some());
        }
    }
}
