//! # Text Normalizer Module
//!
//! ## Purpose
//! Ordered, idempotent sequence of pure text transforms applied to raw
//! extracted legal text before entity extraction and analysis.
//!
//! ## Input/Output Specification
//! - **Input**: Raw extracted text (arbitrary encoding artifacts, OCR noise)
//! - **Output**: Normalized text plus reduction statistics
//! - **Guarantee**: `normalize(normalize(x)) == normalize(x)` for any input
//!
//! ## Key Features
//! - Unicode NFC canonicalization and control-character stripping
//! - Line-ending and whitespace unification
//! - Quote/dash/ellipsis normalization
//! - Hyphenated line-break repair (applied before paragraph collapsing)
//! - Canonical reformatting of CNJ process numbers, CPF/CNPJ, OAB,
//!   phone numbers, slash dates and monetary strings
//! - Removal of known boilerplate (page footers, digital-signature notices)
//!
//! Transform order matters: hyphen-break repair must run before whitespace
//! collapsing, and CNJ reformatting must run before CNPJ/CPF so the shorter
//! digit patterns never fire inside a process number.

use crate::errors::{PipelineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Result of a normalization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedText {
    /// The normalized text
    pub text: String,
    /// Size statistics for the pass
    pub stats: NormalizationStats,
}

/// Size statistics for a normalization pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationStats {
    /// Input length in bytes
    pub original_length: usize,
    /// Output length in bytes
    pub final_length: usize,
    /// Size reduction as a percentage of the input
    pub reduction_percent: f64,
}

/// Text normalizer with precompiled transform patterns
pub struct TextNormalizer {
    hyphen_break: Regex,
    boilerplate: Vec<Regex>,
    tabs_and_spaces: Regex,
    trailing_space: Regex,
    blank_lines: Regex,
    space_before_punct: Regex,
    missing_space_after: Regex,
    cnj_number: Regex,
    cnpj: Regex,
    cpf: Regex,
    oab: Regex,
    phone: Regex,
    slash_date: Regex,
    money_spacing: Regex,
}

impl TextNormalizer {
    /// Create a normalizer, compiling all transform patterns
    pub fn new() -> Result<Self> {
        Ok(Self {
            hyphen_break: compile(r"(\p{L})-\n\s*(\p{Ll})")?,
            boilerplate: vec![
                compile(r"(?im)^\s*p[áa]g(?:ina)?\.?\s*\d+(?:\s+de\s+\d+)?\s*$")?,
                compile(r"(?im)^\s*fls?\.?\s*\d+\s*$")?,
                compile(r"(?im)^.*documento assinado (?:digital|eletronica|eletrônica)mente.*$")?,
                compile(r"(?im)^.*este documento [ée] c[óo]pia do original.*$")?,
                compile(r"(?im)^.*para conferir o original,? acesse o site.*$")?,
                compile(r"(?im)^.*assinado digitalmente por.*$")?,
            ],
            tabs_and_spaces: compile(r"[ \t]+")?,
            trailing_space: compile(r" +\n")?,
            blank_lines: compile(r"\n{3,}")?,
            space_before_punct: compile(r" +([,;:?!])")?,
            missing_space_after: compile(r"([,;])(\p{L})")?,
            cnj_number: compile(
                r"\b(\d{7})[-.\s]?(\d{2})[.\s]?(\d{4})[.\s]?(\d)[.\s]?(\d{2})[.\s]?(\d{4})\b",
            )?,
            cnpj: compile(r"\b(\d{2})\.?(\d{3})\.?(\d{3})/?(\d{4})-?(\d{2})\b")?,
            cpf: compile(r"\b(\d{3})\.?(\d{3})\.?(\d{3})-?(\d{2})\b")?,
            oab: compile(r"\bOAB\s*[/\s-]\s*([A-Z]{2})\s*(?:n[ºo°.]?\s*)?([\d.]+\d)")?,
            phone: compile(r"\((\d{2})\)\s*(\d{4,5})[-.\s]?(\d{4})\b")?,
            slash_date: compile(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b")?,
            money_spacing: compile(r"R\$[ \t]*(\d)")?,
        })
    }

    /// Apply the full ordered transform sequence
    ///
    /// Deterministic and safe to re-apply; empty input yields empty output
    /// with zero reduction.
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let original_length = text.len();

        if text.trim().is_empty() {
            return NormalizedText {
                text: String::new(),
                stats: NormalizationStats {
                    original_length,
                    final_length: 0,
                    reduction_percent: if original_length == 0 { 0.0 } else { 100.0 },
                },
            };
        }

        // 1. Unicode canonicalization
        let mut out: String = text.nfc().collect();

        // 2. Line-ending unification
        out = out.replace("\r\n", "\n").replace('\r', "\n");

        // 3. Control-character stripping (line breaks and tabs survive)
        out = out
            .chars()
            .filter(|&c| c == '\n' || c == '\t' || !c.is_control())
            .collect();

        // 4. Quote/dash/ellipsis normalization
        out = out
            .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
            .replace(['\u{2018}', '\u{2019}'], "'")
            .replace(['\u{2013}', '\u{2014}'], "-")
            .replace('\u{2026}', "...");

        // 5. Hyphenated line-break repair, before any whitespace collapsing
        out = self.hyphen_break.replace_all(&out, "$1$2").to_string();

        // 6. Boilerplate removal
        for pattern in &self.boilerplate {
            out = pattern.replace_all(&out, "").to_string();
        }

        // 7. Whitespace unification and paragraph collapsing
        out = self.tabs_and_spaces.replace_all(&out, " ").to_string();
        out = self.trailing_space.replace_all(&out, "\n").to_string();
        out = self.blank_lines.replace_all(&out, "\n\n").to_string();

        // 8. Punctuation spacing fixes
        out = self.space_before_punct.replace_all(&out, "$1").to_string();
        out = self.missing_space_after.replace_all(&out, "$1 $2").to_string();

        // 9. Canonical reformatting, longest digit patterns first
        out = self
            .cnj_number
            .replace_all(&out, "$1-$2.$3.$4.$5.$6")
            .to_string();
        out = self.cnpj.replace_all(&out, "$1.$2.$3/$4-$5").to_string();
        out = self.cpf.replace_all(&out, "$1.$2.$3-$4").to_string();
        out = self.oab.replace_all(&out, "OAB/$1 $2").to_string();
        out = self.phone.replace_all(&out, "($1) $2-$3").to_string();
        out = self
            .slash_date
            .replace_all(&out, |caps: &regex::Captures| {
                format!(
                    "{:0>2}/{:0>2}/{}",
                    &caps[1], &caps[2], &caps[3]
                )
            })
            .to_string();
        out = self.money_spacing.replace_all(&out, "R$ $1").to_string();

        // 10. Final trim
        let out = out.trim().to_string();

        let final_length = out.len();
        let reduction_percent = if original_length == 0 {
            0.0
        } else {
            (original_length.saturating_sub(final_length)) as f64 / original_length as f64 * 100.0
        };

        tracing::debug!(
            "Normalized {} -> {} bytes ({:.1}% reduction)",
            original_length,
            final_length,
            reduction_percent
        );

        NormalizedText {
            text: out,
            stats: NormalizationStats {
                original_length,
                final_length,
                reduction_percent,
            },
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::Internal {
        message: format!("Invalid normalizer pattern '{}': {}", pattern, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new().unwrap()
    }

    #[test]
    fn test_empty_input() {
        let n = normalizer();
        let result = n.normalize("");
        assert_eq!(result.text, "");
        assert_eq!(result.stats.original_length, 0);
        assert_eq!(result.stats.reduction_percent, 0.0);
    }

    #[test]
    fn test_idempotence_on_representative_input() {
        let n = normalizer();
        let raw = "SENTEN\u{00C7}A\r\n\r\n\r\nO autor ajuizou a\u{00E7}\u{00E3}o de cobran\u{00E7}a em 5/3/2024,\r\nprocesso n\u{00BA} 1234567 89.2023.8.26.0100, pleiteando    R$1.234,56.\r\nP\u{00E1}gina 1 de 10\r\nO r\u{00E9}u \u{2014} citado \u{2013} apresentou contesta\u{00E7}\u{00E3}o interpondo exce\u{00E7}\u{00E3}o de incompe-\r\nt\u{00EA}ncia,conforme fls. 45";
        let once = n.normalize(raw);
        let twice = n.normalize(&once.text);
        assert_eq!(once.text, twice.text);
    }

    #[test]
    fn test_cnj_canonical_format() {
        let n = normalizer();
        let result = n.normalize("Processo 1234567 89.2023.8.26.0100 em andamento");
        assert!(result.text.contains("1234567-89.2023.8.26.0100"));
    }

    #[test]
    fn test_cnj_canonical_is_fixed_point() {
        let n = normalizer();
        let result = n.normalize("Processo 1234567-89.2023.8.26.0100 em andamento");
        assert!(result.text.contains("1234567-89.2023.8.26.0100"));
    }

    #[test]
    fn test_cpf_reformatting() {
        let n = normalizer();
        let result = n.normalize("CPF do autor: 12345678900");
        assert!(result.text.contains("123.456.789-00"));
    }

    #[test]
    fn test_cnpj_reformatting_takes_precedence_over_cpf() {
        let n = normalizer();
        let result = n.normalize("Empresa inscrita no CNPJ 12345678000190");
        assert!(result.text.contains("12.345.678/0001-90"));
        assert!(!result.text.contains("123.456.780"));
    }

    #[test]
    fn test_hyphen_break_repair() {
        let n = normalizer();
        let result = n.normalize("a peti\u{00E7}\u{00E3}o de incompe-\nt\u{00EA}ncia foi rejeitada");
        assert!(result.text.contains("incompet\u{00EA}ncia"));
    }

    #[test]
    fn test_date_zero_padding() {
        let n = normalizer();
        let result = n.normalize("audi\u{00EA}ncia marcada para 5/3/2024");
        assert!(result.text.contains("05/03/2024"));
    }

    #[test]
    fn test_money_spacing() {
        let n = normalizer();
        let result = n.normalize("condeno ao pagamento de R$1.234,56");
        assert!(result.text.contains("R$ 1.234,56"));
    }

    #[test]
    fn test_boilerplate_removed() {
        let n = normalizer();
        let raw = "DESPACHO\nP\u{00E1}gina 3 de 12\nDocumento assinado digitalmente nos termos da lei\nIntime-se.";
        let result = n.normalize(raw);
        assert!(!result.text.contains("P\u{00E1}gina 3"));
        assert!(!result.text.to_lowercase().contains("assinado digitalmente"));
        assert!(result.text.contains("Intime-se."));
    }

    #[test]
    fn test_quote_and_dash_normalization() {
        let n = normalizer();
        let result = n.normalize("\u{201C}citado\u{201D} \u{2013} n\u{00E3}o comparece \u{2026}");
        assert!(result.text.contains("\"citado\""));
        assert!(result.text.contains("-"));
        assert!(result.text.contains("..."));
    }

    #[test]
    fn test_whitespace_collapsing() {
        let n = normalizer();
        let result = n.normalize("linha    com\tespa\u{00E7}os\n\n\n\n\npar\u{00E1}grafo");
        assert!(result.text.contains("linha com espa\u{00E7}os"));
        assert!(result.text.contains("\n\n"));
        assert!(!result.text.contains("\n\n\n"));
    }

    #[test]
    fn test_phone_reformatting() {
        let n = normalizer();
        let result = n.normalize("contato: (11)98765 4321");
        assert!(result.text.contains("(11) 98765-4321"));
    }

    #[test]
    fn test_reduction_stats() {
        let n = normalizer();
        let result = n.normalize("abc    def\n\n\n\nghi");
        assert!(result.stats.final_length < result.stats.original_length);
        assert!(result.stats.reduction_percent > 0.0);
    }
}
