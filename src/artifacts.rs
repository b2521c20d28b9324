//! # Artifact Bundle Module
//!
//! ## Purpose
//! Persists every run output as a categorized directory tree with a
//! navigation index, so the bundle is browsable without any tooling.
//!
//! ## Input/Output Specification
//! - **Input**: All intermediate and final run products plus telemetry
//! - **Output**: Seven numbered category directories of `NN_name.ext` files
//!   and an `INDICE.md` at the bundle root
//!
//! ## Key Features
//! - Deterministic naming: fixed ordinals per category, semantic names
//! - Failed analyses produce a readable placeholder instead of a gap, and
//!   the machine-readable failure list lands in the statistics artifact
//! - Index lists every file with its size, plus entity counts, task cost
//!   and run duration

use crate::chunker::OptimizationResult;
use crate::classify::DocumentClass;
use crate::entities::{EntityCategory, ExtractionReport};
use crate::errors::{PipelineError, Result};
use crate::normalizer::NormalizedText;
use crate::pipeline::RunStats;
use crate::utils::FormatUtils;
use crate::{AnalysisKind, AnalysisResult};
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "INDICE.md";

const DIR_CORE_TEXT: &str = "01_core_text";
const DIR_SUMMARIES: &str = "02_summaries";
const DIR_ANALYSES: &str = "03_analyses";
const DIR_ENTITIES: &str = "04_entities";
const DIR_LEGAL: &str = "05_legal";
const DIR_METADATA: &str = "06_metadata";
const DIR_ATTACHMENTS: &str = "07_attachments";

const CATEGORIES: &[&str] = &[
    DIR_CORE_TEXT,
    DIR_SUMMARIES,
    DIR_ANALYSES,
    DIR_ENTITIES,
    DIR_LEGAL,
    DIR_METADATA,
    DIR_ATTACHMENTS,
];

/// One persisted file inside the bundle
#[derive(Debug, Clone)]
pub struct ArtifactFile {
    pub category: String,
    pub file_name: String,
    pub relative_path: String,
    pub size_bytes: u64,
}

/// The persisted bundle
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub root: PathBuf,
    pub files: Vec<ArtifactFile>,
    pub index_path: PathBuf,
}

/// Everything the writer needs, borrowed from the orchestrator
pub struct BundleInputs<'a> {
    pub run_id: crate::RunId,
    pub normalized: &'a NormalizedText,
    pub extraction: &'a ExtractionReport,
    pub optimization: &'a OptimizationResult,
    pub document_class: &'a DocumentClass,
    pub results: &'a [AnalysisResult],
    pub stats: &'a RunStats,
}

impl<'a> BundleInputs<'a> {
    fn result_for(&self, kind: AnalysisKind) -> Option<&AnalysisResult> {
        self.results.iter().find(|r| r.kind == kind)
    }

    /// Analysis content, or a readable placeholder when the task failed
    fn content_for(&self, kind: AnalysisKind) -> String {
        match self.result_for(kind) {
            Some(result) => match &result.outcome {
                Ok(text) => text.clone(),
                Err(error) => failure_placeholder(kind, error),
            },
            None => failure_placeholder(kind, "tarefa não executada"),
        }
    }

    /// Same as `content_for` but JSON artifacts get a JSON placeholder
    fn json_content_for(&self, kind: AnalysisKind) -> String {
        match self.result_for(kind) {
            Some(result) => match &result.outcome {
                Ok(text) => text.clone(),
                Err(error) => json_failure_placeholder(kind, error),
            },
            None => json_failure_placeholder(kind, "tarefa não executada"),
        }
    }
}

fn failure_placeholder(kind: AnalysisKind, error: &str) -> String {
    format!(
        "# Análise indisponível\n\nA tarefa `{}` não foi concluída nesta execução.\n\nMotivo: {}\n",
        kind, error
    )
}

fn json_failure_placeholder(kind: AnalysisKind, error: &str) -> String {
    serde_json::json!({
        "erro": true,
        "tarefa": kind.as_str(),
        "motivo": error,
    })
    .to_string()
}

/// Write the complete bundle under `output_dir`
pub async fn write_bundle(output_dir: &Path, inputs: &BundleInputs<'_>) -> Result<ArtifactBundle> {
    let root = output_dir.to_path_buf();
    for category in CATEGORIES {
        tokio::fs::create_dir_all(root.join(category))
            .await
            .map_err(|e| write_error(&root.join(category), e))?;
    }

    let mut writer = BundleWriter {
        root: root.clone(),
        files: Vec::new(),
    };

    // 01_core_text
    writer
        .write(DIR_CORE_TEXT, "01_texto_normalizado.txt", inputs.normalized.text.as_bytes())
        .await?;
    writer
        .write_json(DIR_CORE_TEXT, "02_estatisticas_normalizacao.json", &inputs.normalized.stats)
        .await?;

    // 02_summaries
    writer
        .write(
            DIR_SUMMARIES,
            "01_resumo_curto.md",
            inputs.content_for(AnalysisKind::ShortSummary).as_bytes(),
        )
        .await?;
    writer
        .write(
            DIR_SUMMARIES,
            "02_resumo_executivo.md",
            inputs.content_for(AnalysisKind::ExecutiveSummary).as_bytes(),
        )
        .await?;

    // 03_analyses
    writer
        .write(
            DIR_ANALYSES,
            "01_analise_estruturada.json",
            inputs.json_content_for(AnalysisKind::StructuredAnalysis).as_bytes(),
        )
        .await?;
    writer
        .write(
            DIR_ANALYSES,
            "02_analise_riscos.json",
            inputs.json_content_for(AnalysisKind::RiskAnalysis).as_bytes(),
        )
        .await?;
    writer
        .write(
            DIR_ANALYSES,
            "03_pontos_criticos.md",
            inputs.content_for(AnalysisKind::CriticalPoints).as_bytes(),
        )
        .await?;
    writer
        .write(
            DIR_ANALYSES,
            "04_cronologia.md",
            inputs.content_for(AnalysisKind::Chronology).as_bytes(),
        )
        .await?;

    // 04_entities
    writer
        .write_json(DIR_ENTITIES, "01_entidades.json", inputs.extraction)
        .await?;
    writer
        .write_json(
            DIR_ENTITIES,
            "02_valores_monetarios.json",
            &inputs.extraction.category(EntityCategory::Money),
        )
        .await?;

    // 05_legal
    let classification = render_classification(inputs);
    writer
        .write(DIR_LEGAL, "01_classificacao.md", classification.as_bytes())
        .await?;
    writer
        .write_json(
            DIR_LEGAL,
            "02_citacoes_legais.json",
            &inputs.extraction.category(EntityCategory::LegalCitation),
        )
        .await?;

    // 06_metadata
    writer
        .write_json(DIR_METADATA, "01_metadados_documento.json", &inputs.optimization.metadata)
        .await?;
    writer
        .write_json(DIR_METADATA, "02_estatisticas_processamento.json", inputs.stats)
        .await?;
    writer
        .write_json(DIR_METADATA, "03_chunks.json", &inputs.optimization.chunks)
        .await?;

    // 07_attachments
    writer
        .write(DIR_ATTACHMENTS, "01_anexos.md", render_attachments(inputs).as_bytes())
        .await?;

    // Navigation index last, so it can list every file
    let index = render_index(inputs, &writer.files);
    let index_path = root.join(INDEX_FILE);
    tokio::fs::write(&index_path, index)
        .await
        .map_err(|e| write_error(&index_path, e))?;

    tracing::info!(
        "Bundle persisted at {} ({} files)",
        root.display(),
        writer.files.len() + 1
    );

    Ok(ArtifactBundle {
        root,
        files: writer.files,
        index_path,
    })
}

struct BundleWriter {
    root: PathBuf,
    files: Vec<ArtifactFile>,
}

impl BundleWriter {
    async fn write(&mut self, category: &str, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.root.join(category).join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| write_error(&path, e))?;
        self.files.push(ArtifactFile {
            category: category.to_string(),
            file_name: file_name.to_string(),
            relative_path: format!("{}/{}", category, file_name),
            size_bytes: bytes.len() as u64,
        });
        Ok(())
    }

    async fn write_json<T: serde::Serialize>(
        &mut self,
        category: &str,
        file_name: &str,
        value: &T,
    ) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        self.write(category, file_name, json.as_bytes()).await
    }
}

fn write_error(path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::ArtifactWrite {
        path: path.display().to_string(),
        details: e.to_string(),
    }
}

/// Classification artifact: heuristic rule result plus the AI task output
fn render_classification(inputs: &BundleInputs<'_>) -> String {
    let mut out = String::new();
    out.push_str("# Classificação do documento\n\n");
    out.push_str(&format!(
        "**Classificação heurística**: {} (regra `{}`)\n\n",
        inputs.document_class.label, inputs.document_class.matched_rule
    ));
    out.push_str("## Classificação assistida\n\n");
    out.push_str(&inputs.content_for(AnalysisKind::Classification));
    out.push('\n');
    out
}

fn render_attachments(inputs: &BundleInputs<'_>) -> String {
    format!(
        "# Anexos\n\nNenhum anexo foi processado nesta execução ({}).\n\
         Anexos extraídos do caso devem ser depositados neste diretório.\n",
        inputs.run_id
    )
}

fn render_index(inputs: &BundleInputs<'_>, files: &[ArtifactFile]) -> String {
    let stats = inputs.stats;
    let mut out = String::new();

    out.push_str("# Índice do pacote de análise\n\n");
    out.push_str(&format!("- **Execução**: `{}`\n", stats.run_id));
    out.push_str(&format!("- **Documento**: `{}`\n", stats.document_id));
    out.push_str(&format!(
        "- **Classificação**: {}\n",
        inputs.document_class.label
    ));
    out.push_str(&format!("- **Entidades extraídas**: {}\n", stats.entity_count));
    out.push_str(&format!("- **Chunks**: {}\n", stats.chunk_count));
    out.push_str(&format!(
        "- **Tarefas**: {} ({} em cache, {} com falha)\n",
        stats.tasks.len(),
        stats.cached_tasks,
        stats.failures.len()
    ));
    out.push_str(&format!(
        "- **Custo estimado**: {}\n",
        FormatUtils::format_cost(stats.estimated_cost_usd)
    ));
    out.push_str(&format!(
        "- **Tokens**: {}\n\n",
        stats.total_tokens
    ));

    if !stats.failures.is_empty() {
        out.push_str("## Falhas\n\n");
        for failure in &stats.failures {
            out.push_str(&format!("- `{}`: {}\n", failure.kind, failure.error));
        }
        out.push('\n');
    }

    out.push_str("## Arquivos\n\n");
    let mut current_category = "";
    for file in files {
        if file.category != current_category {
            out.push_str(&format!("### {}\n\n", file.category));
            current_category = &file.category;
        }
        out.push_str(&format!(
            "- [{}]({}) ({})\n",
            file.file_name,
            file.relative_path,
            FormatUtils::format_bytes(file.size_bytes)
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker;
    use crate::classify;
    use crate::entities::EntityExtractor;
    use crate::normalizer::TextNormalizer;
    use crate::ModelTier;
    use chrono::Utc;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn sample_inputs() -> (NormalizedText, ExtractionReport, OptimizationResult, DocumentClass) {
        let normalizer = TextNormalizer::new().unwrap();
        let normalized = normalizer.normalize(
            "SENTENÇA\n\nProcesso 1234567-89.2023.8.26.0100. Condeno ao pagamento de R$ 10.000,50.",
        );
        let extractor = EntityExtractor::new(&crate::config::Config::default().pipeline).unwrap();
        let extraction = extractor.extract_all(&normalized.text);
        let optimization = chunker::optimize(&normalized.text, 8000);
        let class = classify::classify(&normalized.text);
        (normalized, extraction, optimization, class)
    }

    fn sample_stats(results: &[AnalysisResult]) -> RunStats {
        RunStats {
            run_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            final_stage: crate::PipelineStage::Aggregating,
            stage_timings_ms: HashMap::new(),
            total_duration_ms: 42,
            tasks: Vec::new(),
            failures: results
                .iter()
                .filter_map(|r| {
                    r.outcome.as_ref().err().map(|e| crate::pipeline::TaskFailure {
                        kind: r.kind,
                        error: e.clone(),
                    })
                })
                .collect(),
            cached_tasks: 0,
            total_tokens: 100,
            estimated_cost_usd: 0.01,
            entity_count: 2,
            chunk_count: 1,
        }
    }

    fn result(kind: AnalysisKind, outcome: std::result::Result<&str, &str>) -> AnalysisResult {
        AnalysisResult {
            kind,
            tier: ModelTier::Fast,
            outcome: outcome.map(String::from).map_err(String::from),
            cached: false,
            duration_ms: 5,
            usage: None,
        }
    }

    #[tokio::test]
    async fn test_bundle_layout_is_complete() {
        let (normalized, extraction, optimization, class) = sample_inputs();
        let results: Vec<AnalysisResult> = AnalysisKind::all()
            .iter()
            .map(|&k| result(k, Ok("conteúdo")))
            .collect();
        let stats = sample_stats(&results);
        let dir = TempDir::new().unwrap();

        let bundle = write_bundle(
            dir.path(),
            &BundleInputs {
                run_id: stats.run_id,
                normalized: &normalized,
                extraction: &extraction,
                optimization: &optimization,
                document_class: &class,
                results: &results,
                stats: &stats,
            },
        )
        .await
        .unwrap();

        for category in CATEGORIES {
            assert!(dir.path().join(category).is_dir(), "missing {}", category);
        }
        assert!(bundle.index_path.is_file());
        assert_eq!(bundle.files.len(), 16);

        let normalized_file = dir.path().join(DIR_CORE_TEXT).join("01_texto_normalizado.txt");
        let content = std::fs::read_to_string(normalized_file).unwrap();
        assert!(content.contains("1234567-89.2023.8.26.0100"));
    }

    #[tokio::test]
    async fn test_failed_analysis_gets_placeholder_and_failure_record() {
        let (normalized, extraction, optimization, class) = sample_inputs();
        let results = vec![
            result(AnalysisKind::ShortSummary, Err("serviço indisponível")),
            result(AnalysisKind::RiskAnalysis, Err("tempo esgotado")),
        ];
        let stats = sample_stats(&results);
        let dir = TempDir::new().unwrap();

        write_bundle(
            dir.path(),
            &BundleInputs {
                run_id: stats.run_id,
                normalized: &normalized,
                extraction: &extraction,
                optimization: &optimization,
                document_class: &class,
                results: &results,
                stats: &stats,
            },
        )
        .await
        .unwrap();

        let summary =
            std::fs::read_to_string(dir.path().join(DIR_SUMMARIES).join("01_resumo_curto.md"))
                .unwrap();
        assert!(summary.contains("serviço indisponível"));

        // JSON artifacts keep a parseable placeholder
        let risk =
            std::fs::read_to_string(dir.path().join(DIR_ANALYSES).join("02_analise_riscos.json"))
                .unwrap();
        let value: serde_json::Value = serde_json::from_str(&risk).unwrap();
        assert_eq!(value["erro"], true);

        let processing = std::fs::read_to_string(
            dir.path().join(DIR_METADATA).join("02_estatisticas_processamento.json"),
        )
        .unwrap();
        let stats_value: serde_json::Value = serde_json::from_str(&processing).unwrap();
        assert_eq!(stats_value["failures"].as_array().unwrap().len(), 2);

        let index = std::fs::read_to_string(dir.path().join(INDEX_FILE)).unwrap();
        assert!(index.contains("## Falhas"));
    }
}
