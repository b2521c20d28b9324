//! # Legal Document Processor Main Driver
//!
//! ## Purpose
//! Main entry point for the legal document processor. Loads configuration,
//! wires the pipeline components together and runs a complete processing
//! pass over one case file.
//!
//! ## Input/Output Specification
//! - **Input**: Case file path, command line arguments, environment variables
//! - **Output**: Categorized artifact bundle in the output directory
//!
//! ## Key Features
//! - Configuration loading with environment overrides
//! - Offline mode with a scripted completion service
//! - Cache maintenance subcommand-style flags (stats, clear)
//! - Structured logging initialization
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the analysis cache
//! 4. Build the pipeline with the chosen completion service
//! 5. Run the document and persist the bundle

use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use legal_doc_pipeline::{
    cache::CacheStore,
    completion::{CompletionService, HttpCompletionService, ScriptedCompletionService},
    config::Config,
    errors::{PipelineError, Result},
    pipeline::{DocumentPipeline, RunContext},
    utils::FormatUtils,
    validation_error, RawDocument,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("legal-doc-processor")
        .version("1.0.0")
        .about("Deterministic processing pipeline for Brazilian legal case files")
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("Case file to process (plain text)")
                .required_unless_present_any(["cache-stats", "cache-clear"]),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for the artifact bundle")
                .default_value("./resultado"),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Run without a completion endpoint (scripted responses)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("stats")
                .long("stats")
                .help("Print run statistics after processing")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cache-stats")
                .long("cache-stats")
                .help("Print cache statistics and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("cache-clear")
                .long("cache-clear")
                .help("Remove every cache entry and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").cloned().unwrap_or_default();
    let config = Config::from_file(&config_path)?;
    init_logging(&config)?;

    info!("Starting legal document processor v1.0.0");
    info!("Configuration loaded from: {}", config_path);

    let cache = Arc::new(CacheStore::open(&config.cache).await?);

    // Cache maintenance modes exit before any processing
    if matches.get_flag("cache-stats") {
        let stats = cache.stats().await;
        println!("Entradas em cache : {}", stats.total_entries);
        println!("Tamanho total     : {}", FormatUtils::format_bytes(stats.total_size_bytes));
        println!("Acessos acumulados: {}", stats.total_hits);
        return Ok(());
    }
    if matches.get_flag("cache-clear") {
        cache.clear().await?;
        println!("Cache limpo.");
        return Ok(());
    }

    let input_path = matches
        .get_one::<String>("input")
        .ok_or_else(|| validation_error!("input", "input file is required"))?;
    let output_dir = PathBuf::from(matches.get_one::<String>("output").cloned().unwrap_or_default());

    let document = RawDocument::new(tokio::fs::read_to_string(input_path).await?);
    info!(
        "Processing {} as document {} ({} bytes)",
        input_path, document.id, document.byte_size
    );

    let completion: Arc<dyn CompletionService> = if matches.get_flag("offline") {
        warn!("Offline mode: analyses use scripted placeholder responses");
        Arc::new(ScriptedCompletionService::new())
    } else {
        Arc::new(HttpCompletionService::new(&config.completion)?)
    };

    let run_stats_wanted = matches.get_flag("stats");
    let pipeline = DocumentPipeline::new(config, cache, completion)?;

    let mut ctx = RunContext::new(&output_dir);
    ctx.document_id = document.id;
    let bundle = pipeline.run(&document.source_text, ctx).await?;

    println!(
        "Pacote gerado em {} ({} arquivos)",
        bundle.root.display(),
        bundle.files.len() + 1
    );

    if run_stats_wanted {
        print_run_stats(&bundle)?;
    }

    Ok(())
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.level).map_err(|e| PipelineError::Config {
            message: format!("Invalid log level '{}': {}", config.logging.level, e),
        })?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    if config.logging.json_format {
        tracing_subscriber::registry()
            .with(fmt_layer.json().with_filter(filter))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt_layer.with_filter(filter))
            .init();
    }

    Ok(())
}

/// Print the statistics artifact in a terminal-friendly form
fn print_run_stats(bundle: &legal_doc_pipeline::artifacts::ArtifactBundle) -> Result<()> {
    let stats_path = bundle
        .root
        .join("06_metadata")
        .join("02_estatisticas_processamento.json");
    let raw = std::fs::read_to_string(&stats_path)?;
    let stats: serde_json::Value = serde_json::from_str(&raw)?;

    println!("\nEstatísticas da execução:");
    if let Some(ms) = stats["total_duration_ms"].as_u64() {
        println!(
            "  Duração   : {}",
            FormatUtils::format_duration(std::time::Duration::from_millis(ms))
        );
    }
    println!("  Entidades : {}", stats["entity_count"]);
    println!("  Chunks    : {}", stats["chunk_count"]);
    println!("  Tokens    : {}", stats["total_tokens"]);
    if let Some(cost) = stats["estimated_cost_usd"].as_f64() {
        println!("  Custo     : {}", FormatUtils::format_cost(cost));
    }
    if let Some(failures) = stats["failures"].as_array() {
        if !failures.is_empty() {
            println!("  Falhas    : {}", failures.len());
            for failure in failures {
                println!("    - {}: {}", failure["kind"], failure["error"]);
            }
        }
    }

    Ok(())
}
