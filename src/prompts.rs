//! # Prompt Templates Module
//!
//! ## Purpose
//! Per-analysis prompt templates rendered against the normalized document,
//! extracted entity digest and heuristic classification.
//!
//! ## Input/Output Specification
//! - **Input**: Analysis kind, prompt context (excerpt, entities, class,
//!   optional dependency output)
//! - **Output**: System prompt plus user prompt strings for the completion
//!   service
//!
//! Structured kinds instruct the model to answer with a single JSON object;
//! the orchestrator validates that shape and falls back to best-effort
//! extraction when the model ignores it.

use crate::entities::{EntityCategory, ExtractionReport};
use crate::utils::TextUtils;
use crate::AnalysisKind;

/// Context assembled by the orchestrator for prompt rendering
#[derive(Debug, Clone)]
pub struct PromptContext {
    /// Excerpt of the normalized text, bounded by configuration
    pub excerpt: String,
    /// One-line-per-category digest of extracted entities
    pub entity_digest: String,
    /// Heuristic document class label
    pub document_class: String,
    /// Output of the dependency task, when one exists
    pub dependency_output: Option<String>,
}

impl PromptContext {
    /// Build a context from pipeline intermediate results
    pub fn build(
        normalized: &str,
        report: &ExtractionReport,
        document_class: &str,
        excerpt_chars: usize,
    ) -> Self {
        Self {
            excerpt: TextUtils::truncate(normalized, excerpt_chars),
            entity_digest: entity_digest(report),
            document_class: document_class.to_string(),
            dependency_output: None,
        }
    }
}

/// Summarize the extraction report as prompt-friendly lines
fn entity_digest(report: &ExtractionReport) -> String {
    let mut lines = Vec::new();
    for category in EntityCategory::all() {
        let found = report.category(*category);
        if found.is_empty() {
            continue;
        }
        let values: Vec<&str> = found
            .iter()
            .take(10)
            .map(|e| e.canonical_value.as_str())
            .collect();
        lines.push(format!("- {}: {}", category, values.join("; ")));
    }
    if lines.is_empty() {
        "- nenhuma entidade extraída".to_string()
    } else {
        lines.join("\n")
    }
}

const SYSTEM_BASE: &str = "Você é um assistente jurídico especializado em processos judiciais brasileiros. Responda em português, com precisão e sem inventar fatos que não constem do documento.";

/// Render the (system, user) prompt pair for an analysis kind
pub fn render(kind: AnalysisKind, ctx: &PromptContext) -> (String, String) {
    let task_instruction = match kind {
        AnalysisKind::Classification => {
            "TAREFA classification: classifique o documento. Informe o tipo de peça processual, \
             a área do direito e a fase processual, em no máximo cinco linhas."
        }
        AnalysisKind::ShortSummary => {
            "TAREFA short_summary: escreva um resumo curto (no máximo dez linhas) do documento, \
             cobrindo partes, pedido e estado atual."
        }
        AnalysisKind::Chronology => {
            "TAREFA chronology: reconstrua a cronologia dos eventos mencionados no documento, \
             em lista Markdown ordenada por data, uma linha por evento no formato 'dd/mm/aaaa - evento'."
        }
        AnalysisKind::StructuredAnalysis => {
            "TAREFA structured_analysis: produza uma análise completa do documento. Responda com \
             um único objeto JSON com os campos: \"tipo_documento\" (string), \"partes\" (array de \
             strings), \"pedidos\" (array de strings), \"fundamentos\" (array de strings), \
             \"valores\" (array de strings), \"conclusao\" (string). Não inclua texto fora do JSON."
        }
        AnalysisKind::RiskAnalysis => {
            "TAREFA risk_analysis: avalie os riscos processuais considerando a classificação \
             fornecida. Responda com um único objeto JSON com os campos: \"nivel_risco\" \
             (\"baixo\"|\"medio\"|\"alto\"), \"fatores\" (array de strings), \"recomendacoes\" \
             (array de strings). Não inclua texto fora do JSON."
        }
        AnalysisKind::ExecutiveSummary => {
            "TAREFA executive_summary: escreva um resumo executivo em Markdown para tomadores de \
             decisão: situação, exposição financeira, próximos passos. No máximo vinte linhas."
        }
        AnalysisKind::CriticalPoints => {
            "TAREFA critical_points: liste os pontos críticos do documento (prazos, nulidades, \
             riscos de preclusão, valores relevantes) em lista Markdown priorizada."
        }
    };

    let system = format!("{}\n\n{}", SYSTEM_BASE, task_instruction);

    let mut user = format!(
        "CLASSIFICAÇÃO HEURÍSTICA: {}\n\nENTIDADES EXTRAÍDAS:\n{}\n",
        ctx.document_class, ctx.entity_digest
    );
    if let Some(dependency) = &ctx.dependency_output {
        user.push_str(&format!("\nRESULTADO DA CLASSIFICAÇÃO:\n{}\n", dependency));
    }
    user.push_str(&format!("\nDOCUMENTO:\n{}\n", ctx.excerpt));

    (system, user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entities::EntityExtractor;

    fn context() -> PromptContext {
        let config = Config::default();
        let extractor = EntityExtractor::new(&config.pipeline).unwrap();
        let text = "SENTENÇA no processo 1234567-89.2023.8.26.0100, valor R$ 10.000,50";
        let report = extractor.extract_all(text);
        PromptContext::build(text, &report, "sentença", 2000)
    }

    #[test]
    fn test_prompt_contains_document_and_entities() {
        let ctx = context();
        let (system, user) = render(AnalysisKind::ShortSummary, &ctx);
        assert!(system.contains("short_summary"));
        assert!(user.contains("1234567-89.2023.8.26.0100"));
        assert!(user.contains("sentença"));
    }

    #[test]
    fn test_structured_kinds_request_json() {
        let ctx = context();
        let (system, _) = render(AnalysisKind::StructuredAnalysis, &ctx);
        assert!(system.contains("JSON"));
        let (system, _) = render(AnalysisKind::RiskAnalysis, &ctx);
        assert!(system.contains("JSON"));
    }

    #[test]
    fn test_dependency_output_is_injected() {
        let mut ctx = context();
        ctx.dependency_output = Some("peça: sentença cível".to_string());
        let (_, user) = render(AnalysisKind::RiskAnalysis, &ctx);
        assert!(user.contains("RESULTADO DA CLASSIFICAÇÃO"));
        assert!(user.contains("sentença cível"));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let config = Config::default();
        let extractor = EntityExtractor::new(&config.pipeline).unwrap();
        let text = "palavra ".repeat(10_000);
        let report = extractor.extract_all(&text);
        let ctx = PromptContext::build(&text, &report, "documento jurídico", 500);
        assert!(ctx.excerpt.chars().count() <= 500);
    }
}
