//! # Entity Extraction Module
//!
//! ## Purpose
//! Regex-based extraction of Brazilian legal entities from normalized text,
//! with per-category deduplication, byte offsets and provenance windows.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized legal case text
//! - **Output**: Per-category entity records plus extraction statistics
//! - **Categories**: Process numbers, CPF, CNPJ, OAB, monetary values, dates,
//!   legal citations, judicial bodies, parties
//!
//! ## Key Features
//! - Byte offset and ~80-char context window per hit
//! - Dedup by canonical value, first occurrence wins
//! - Date validity checks accounting for leap years
//! - CNJ 7-2-4-1-2-4 digit grouping validation
//! - Brazilian vs generic decimal notation disambiguation for money
//! - Label-anchored heuristic party extraction (best effort, approximate)
//!
//! Extraction never fails on malformed input: the worst case is an empty
//! collection for a category, which is logged as a warning.

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result};
use crate::utils::TextUtils;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Entity categories recognized by the extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    ProcessNumber,
    Cpf,
    Cnpj,
    Oab,
    Money,
    Date,
    LegalCitation,
    JudicialBody,
    Party,
}

impl EntityCategory {
    pub fn all() -> &'static [EntityCategory] {
        &[
            EntityCategory::ProcessNumber,
            EntityCategory::Cpf,
            EntityCategory::Cnpj,
            EntityCategory::Oab,
            EntityCategory::Money,
            EntityCategory::Date,
            EntityCategory::LegalCitation,
            EntityCategory::JudicialBody,
            EntityCategory::Party,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityCategory::ProcessNumber => "process_numbers",
            EntityCategory::Cpf => "cpf",
            EntityCategory::Cnpj => "cnpj",
            EntityCategory::Oab => "oab",
            EntityCategory::Money => "monetary_values",
            EntityCategory::Date => "dates",
            EntityCategory::LegalCitation => "legal_citations",
            EntityCategory::JudicialBody => "judicial_bodies",
            EntityCategory::Party => "parties",
        }
    }
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted entity with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Text exactly as matched
    pub raw_match: String,
    /// Canonical (deduplication) value
    pub canonical_value: String,
    /// Byte offset of the match in the normalized text
    pub byte_offset: usize,
    /// Fixed-width context window around the match
    pub context: String,
    /// Numeric magnitude, set for monetary values only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_value: Option<f64>,
}

/// Per-category extraction statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub counts: HashMap<String, usize>,
    pub total_entities: usize,
}

/// Complete extraction output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub entities: HashMap<EntityCategory, Vec<Entity>>,
    pub stats: ExtractionStats,
}

impl ExtractionReport {
    pub fn category(&self, category: EntityCategory) -> &[Entity] {
        self.entities.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Entity extractor with precompiled patterns
pub struct EntityExtractor {
    context_chars: usize,
    cnj: Regex,
    cnpj: Regex,
    cpf: Regex,
    oab: Regex,
    money: Regex,
    slash_date: Regex,
    textual_date: Regex,
    citations: Vec<Regex>,
    judicial_bodies: Regex,
    party_labels: Vec<(Regex, &'static str)>,
}

impl EntityExtractor {
    /// Create an extractor, compiling all category patterns
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            context_chars: config.entity_context_chars,
            cnj: compile(
                r"\b(\d{7})[-.\s]?(\d{2})[.\s]?(\d{4})[.\s]?(\d)[.\s]?(\d{2})[.\s]?(\d{4})\b",
            )?,
            cnpj: compile(r"\b\d{2}\.?\d{3}\.?\d{3}/\d{4}-?\d{2}\b")?,
            cpf: compile(r"\b\d{3}\.\d{3}\.\d{3}-\d{2}\b")?,
            oab: compile(r"\bOAB/([A-Z]{2})\s*(?:n[ºo°.]?\s*)?([\d.]+\d)")?,
            money: compile(r"R\$\s*(\d[\d.,]*\d|\d)")?,
            slash_date: compile(r"\b(\d{2})/(\d{2})/(\d{4})\b")?,
            textual_date: compile(
                r"(?i)\b(\d{1,2})[º°]?\s+de\s+(janeiro|fevereiro|março|marco|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)\s+de\s+(\d{4})\b",
            )?,
            citations: vec![
                compile(r"(?i)\bLei\s+(?:Complementar\s+)?n?[ºo°.]?\s*[\d.]+(?:/\d{4})?")?,
                compile(r"(?i)\bart(?:igo)?\.?\s*\d+[ºo°]?(?:\s*,\s*(?:§\s*\d+[ºo°]?|caput|inciso\s+[IVXLCDM]+))*(?:\s+d[aoe]\s+(?:CF|CC|CPC|CPP|CLT|CTN|CDC))?")?,
                compile(r"(?i)\bS[úu]mula\s+(?:Vinculante\s+)?n?[ºo°.]?\s*\d+(?:\s+do\s+\w+)?")?,
                compile(r"(?i)\bDecreto(?:-Lei)?\s+n?[ºo°.]?\s*[\d.]+(?:/\d{4})?")?,
            ],
            judicial_bodies: compile(
                r"(?i)\b(Supremo Tribunal Federal|Superior Tribunal de Justi[çc]a|Tribunal de Justi[çc]a(?:\s+d[oe]\s+(?:Estado\s+d[oe]\s+)?[A-ZÀ-Ú][\p{L} ]{2,40})?|Tribunal Regional Federal(?:\s+da\s+\d+[ªa]\s+Regi[ãa]o)?|Tribunal Regional do Trabalho(?:\s+da\s+\d+[ªa]\s+Regi[ãa]o)?|STF|STJ|TST|TJ[A-Z]{2}|TRF\s*\d|TRT\s*\d+|\d+[ªa]\s+Vara\s+(?:C[íi]vel|Criminal|Federal|do\s+Trabalho|de\s+Fam[íi]lia(?:\s+e\s+Sucess[õo]es)?|da\s+Fazenda\s+P[úu]blica))\b",
            )?,
            party_labels: vec![
                (
                    compile(r"(?im)^\s*(?:autora?|requerente|exequente|impetrante|agravante|apelante|embargante|reclamante)\s*[:\-]\s*(.{3,120})$")?,
                    "autor",
                ),
                (
                    compile(r"(?im)^\s*(?:r[ée]u?s?|r[ée]|requeridos?a?|executados?a?|impetrados?a?|agravados?a?|apelados?a?|embargados?a?|reclamadas?o?)\s*[:\-]\s*(.{3,120})$")?,
                    "reu",
                ),
            ],
        })
    }

    /// Run every sub-extractor over the text
    ///
    /// Never fails on malformed input; categories that match nothing are
    /// logged and reported as empty collections.
    pub fn extract_all(&self, text: &str) -> ExtractionReport {
        let mut entities: HashMap<EntityCategory, Vec<Entity>> = HashMap::new();

        entities.insert(EntityCategory::ProcessNumber, self.extract_process_numbers(text));
        entities.insert(EntityCategory::Cnpj, self.extract_simple(text, &self.cnpj, format_cnpj));
        entities.insert(EntityCategory::Cpf, self.extract_simple(text, &self.cpf, format_cpf));
        entities.insert(EntityCategory::Oab, self.extract_oab(text));
        entities.insert(EntityCategory::Money, self.extract_money(text));
        entities.insert(EntityCategory::Date, self.extract_dates(text));
        entities.insert(EntityCategory::LegalCitation, self.extract_citations(text));
        entities.insert(EntityCategory::JudicialBody, self.extract_judicial_bodies(text));
        entities.insert(EntityCategory::Party, self.extract_parties(text));

        let mut stats = ExtractionStats::default();
        for (category, list) in &entities {
            if list.is_empty() {
                tracing::debug!("No entities found for category '{}'", category);
            }
            stats.counts.insert(category.as_str().to_string(), list.len());
            stats.total_entities += list.len();
        }

        tracing::info!("Extracted {} entities across {} categories",
            stats.total_entities, entities.len());

        ExtractionReport { entities, stats }
    }

    /// CNJ process numbers, validated against the 7-2-4-1-2-4 grouping
    fn extract_process_numbers(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for caps in self.cnj.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let canonical = format!(
                "{}-{}.{}.{}.{}.{}",
                &caps[1], &caps[2], &caps[3], &caps[4], &caps[5], &caps[6]
            );
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }
        out
    }

    /// CPF/CNPJ style matches, canonicalized from the digit string and
    /// deduplicated on the canonical value
    fn extract_simple(
        &self,
        text: &str,
        pattern: &Regex,
        canonicalize: fn(&str) -> String,
    ) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for m in pattern.find_iter(text) {
            let canonical = canonicalize(m.as_str());
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }
        out
    }

    /// OAB registrations, canonicalized to `OAB/UF NNNNNN`
    fn extract_oab(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for caps in self.oab.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let digits: String = caps[2].chars().filter(char::is_ascii_digit).collect();
            let canonical = format!("OAB/{} {}", &caps[1], digits);
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }
        out
    }

    /// Monetary values; Brazilian vs generic decimal notation is decided by
    /// the relative position of the last comma and the last dot. Results are
    /// sorted descending by magnitude.
    fn extract_money(&self, text: &str) -> Vec<Entity> {
        let mut out: Vec<Entity> = Vec::new();
        let mut seen = HashSet::new();

        for caps in self.money.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let Some(value) = parse_monetary(&caps[1]) else {
                continue;
            };
            let canonical = format_brl(value);
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), Some(value)));
            }
        }

        out.sort_by(|a, b| {
            b.numeric_value
                .partial_cmp(&a.numeric_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// Slash and textual dates, validated (leap years included) and
    /// canonicalized to `dd/mm/yyyy`
    fn extract_dates(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for caps in self.slash_date.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let (day, month, year) = (
                caps[1].parse::<u32>().unwrap_or(0),
                caps[2].parse::<u32>().unwrap_or(0),
                caps[3].parse::<i32>().unwrap_or(0),
            );
            if !is_valid_date(day, month, year) {
                tracing::debug!("Rejected impossible date '{}'", m.as_str());
                continue;
            }
            let canonical = format!("{:02}/{:02}/{}", day, month, year);
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }

        for caps in self.textual_date.captures_iter(text) {
            let m = caps.get(0).expect("group 0 always present");
            let day = caps[1].parse::<u32>().unwrap_or(0);
            let Some(month) = month_number(&caps[2]) else {
                continue;
            };
            let year = caps[3].parse::<i32>().unwrap_or(0);
            if !is_valid_date(day, month, year) {
                continue;
            }
            let canonical = format!("{:02}/{:02}/{}", day, month, year);
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }
        out
    }

    /// Statute/article/súmula citations
    fn extract_citations(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for pattern in &self.citations {
            for m in pattern.find_iter(text) {
                let canonical = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
                if seen.insert(canonical.clone()) {
                    out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
                }
            }
        }

        out.sort_by_key(|e| e.byte_offset);
        out
    }

    /// Courts and judicial organs
    fn extract_judicial_bodies(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for m in self.judicial_bodies.find_iter(text) {
            let canonical = m.as_str().trim().to_uppercase();
            if seen.insert(canonical.clone()) {
                out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
            }
        }
        out
    }

    /// Parties anchored on role labels ("autor:", "réu:", ...)
    ///
    /// Heuristic and best-effort: free-text party identification is
    /// approximate by design and only label-introduced names are captured.
    fn extract_parties(&self, text: &str) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for (pattern, role) in &self.party_labels {
            for caps in pattern.captures_iter(text) {
                let m = caps.get(0).expect("group 0 always present");
                let name = caps[1].trim().trim_end_matches(['.', ',']).to_string();
                if name.is_empty() {
                    continue;
                }
                let canonical = format!("{}: {}", role, name.to_uppercase());
                if seen.insert(canonical.clone()) {
                    out.push(self.entity(text, m.as_str(), canonical, m.start(), None));
                }
            }
        }
        out
    }

    fn entity(
        &self,
        text: &str,
        raw: &str,
        canonical: String,
        offset: usize,
        numeric_value: Option<f64>,
    ) -> Entity {
        Entity {
            raw_match: raw.to_string(),
            canonical_value: canonical,
            byte_offset: offset,
            context: context_window(text, offset, raw.len(), self.context_chars),
            numeric_value,
        }
    }
}

/// Extract a fixed-width context window around a match, split evenly before
/// and after, clamped to char boundaries
fn context_window(text: &str, offset: usize, match_len: usize, width: usize) -> String {
    let half = width / 2;
    let start = TextUtils::floor_char_boundary(text, offset.saturating_sub(half));
    let end = TextUtils::ceil_char_boundary(text, (offset + match_len + half).min(text.len()));
    text[start..end].replace('\n', " ")
}

/// Canonical dotted CPF form from any matched variant
fn format_cpf(s: &str) -> String {
    let d: String = s.chars().filter(char::is_ascii_digit).collect();
    if d.len() == 11 {
        format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
    } else {
        s.to_string()
    }
}

/// Canonical CNPJ form from any matched variant
fn format_cnpj(s: &str) -> String {
    let d: String = s.chars().filter(char::is_ascii_digit).collect();
    if d.len() == 14 {
        format!(
            "{}.{}.{}/{}-{}",
            &d[0..2],
            &d[2..5],
            &d[5..8],
            &d[8..12],
            &d[12..14]
        )
    } else {
        s.to_string()
    }
}

/// Parse a monetary amount, disambiguating `1.234,56` (Brazilian) from
/// `1,234.56` (generic) by the relative position of the last comma and dot
pub fn parse_monetary(raw: &str) -> Option<f64> {
    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(c), None) => {
            // A single comma followed by exactly two digits is a decimal
            // separator; otherwise treat commas as thousands grouping
            if raw.len().saturating_sub(c) == 3 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (None, Some(d)) => {
            if raw.len().saturating_sub(d) == 3 {
                raw.to_string()
            } else {
                raw.replace('.', "")
            }
        }
        (None, None) => raw.to_string(),
    };

    normalized.parse::<f64>().ok()
}

/// Format a value in canonical Brazilian display notation (`R$ 1.234,56`)
pub fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let int_part = cents / 100;
    let frac_part = (cents % 100).abs();

    let digits = int_part.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if int_part < 0 { "-" } else { "" };
    format!("R$ {}{},{:02}", sign, grouped, frac_part)
}

/// Date validity including leap-year handling
pub fn is_valid_date(day: u32, month: u32, year: i32) -> bool {
    if !(1..=12).contains(&month) || day == 0 || !(1500..=2200).contains(&year) {
        return false;
    }
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    let max_day = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => unreachable!(),
    };
    day <= max_day
}

fn month_number(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "janeiro" => 1,
        "fevereiro" => 2,
        "março" | "marco" => 3,
        "abril" => 4,
        "maio" => 5,
        "junho" => 6,
        "julho" => 7,
        "agosto" => 8,
        "setembro" => 9,
        "outubro" => 10,
        "novembro" => 11,
        "dezembro" => 12,
        _ => return None,
    };
    Some(n)
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PipelineError::Internal {
        message: format!("Invalid extraction pattern '{}': {}", pattern, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(&Config::default().pipeline).unwrap()
    }

    #[test]
    fn test_end_to_end_sample_text() {
        let e = extractor();
        let text = "Processo 1234567-89.2023.8.26.0100, CPF 123.456.789-00, \
                    valor da causa R$ 10.000,50.";
        let report = e.extract_all(text);

        let procs = report.category(EntityCategory::ProcessNumber);
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].canonical_value, "1234567-89.2023.8.26.0100");

        let cpfs = report.category(EntityCategory::Cpf);
        assert_eq!(cpfs.len(), 1);

        let money = report.category(EntityCategory::Money);
        assert_eq!(money.len(), 1);
        assert_eq!(money[0].numeric_value, Some(10000.50));
    }

    #[test]
    fn test_dedup_first_occurrence_wins() {
        let e = extractor();
        let text = "CPF 123.456.789-00 citado novamente: CPF 123.456.789-00 ao final";
        let report = e.extract_all(text);
        let cpfs = report.category(EntityCategory::Cpf);
        assert_eq!(cpfs.len(), 1);
        // First-seen context retained
        assert!(cpfs[0].byte_offset < 20);
    }

    #[test]
    fn test_monetary_notation_disambiguation() {
        assert_eq!(parse_monetary("1.234,56"), Some(1234.56));
        assert_eq!(parse_monetary("1,234.56"), Some(1234.56));
        assert_eq!(parse_monetary("1234.56"), Some(1234.56));
        assert_eq!(parse_monetary("1234,56"), Some(1234.56));
        assert_eq!(parse_monetary("1.234.567"), Some(1234567.0));
        assert_eq!(parse_monetary("500"), Some(500.0));
    }

    #[test]
    fn test_monetary_sorted_descending() {
        let e = extractor();
        let text = "custas de R$ 150,00; condenação de R$ 10.000,50; multa R$ 2.500,00";
        let report = e.extract_all(text);
        let money = report.category(EntityCategory::Money);
        assert_eq!(money.len(), 3);
        assert_eq!(money[0].numeric_value, Some(10000.50));
        assert_eq!(money[2].numeric_value, Some(150.0));
    }

    #[test]
    fn test_monetary_canonical_display() {
        assert_eq!(format_brl(10000.50), "R$ 10.000,50");
        assert_eq!(format_brl(150.0), "R$ 150,00");
        assert_eq!(format_brl(1234567.89), "R$ 1.234.567,89");
    }

    #[test]
    fn test_impossible_dates_rejected() {
        assert!(!is_valid_date(31, 2, 2024));
        assert!(!is_valid_date(31, 4, 2023));
        assert!(!is_valid_date(0, 1, 2023));
        assert!(!is_valid_date(1, 13, 2023));
    }

    #[test]
    fn test_leap_years() {
        assert!(is_valid_date(29, 2, 2024));
        assert!(is_valid_date(29, 2, 2000));
        assert!(!is_valid_date(29, 2, 2023));
        assert!(!is_valid_date(29, 2, 1900));
    }

    #[test]
    fn test_date_extraction_filters_invalid() {
        let e = extractor();
        let text = "audiência em 29/02/2024 e prazo até 31/02/2024";
        let report = e.extract_all(text);
        let dates = report.category(EntityCategory::Date);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].canonical_value, "29/02/2024");
    }

    #[test]
    fn test_textual_date() {
        let e = extractor();
        let text = "Sentença proferida em 15 de março de 2024.";
        let report = e.extract_all(text);
        let dates = report.category(EntityCategory::Date);
        assert_eq!(dates.len(), 1);
        assert_eq!(dates[0].canonical_value, "15/03/2024");
    }

    #[test]
    fn test_oab_extraction() {
        let e = extractor();
        let text = "advogado Dr. Fulano, OAB/SP 123.456";
        let report = e.extract_all(text);
        let oabs = report.category(EntityCategory::Oab);
        assert_eq!(oabs.len(), 1);
        assert_eq!(oabs[0].canonical_value, "OAB/SP 123456");
    }

    #[test]
    fn test_party_labels() {
        let e = extractor();
        let text = "Autor: João da Silva\nRéu: Empresa XYZ Ltda.\n";
        let report = e.extract_all(text);
        let parties = report.category(EntityCategory::Party);
        assert_eq!(parties.len(), 2);
        assert!(parties.iter().any(|p| p.canonical_value.starts_with("autor:")));
        assert!(parties.iter().any(|p| p.canonical_value.starts_with("reu:")));
    }

    #[test]
    fn test_judicial_bodies() {
        let e = extractor();
        let text = "Distribuído à 3ª Vara Cível; recurso ao Tribunal de Justiça de São Paulo.";
        let report = e.extract_all(text);
        let bodies = report.category(EntityCategory::JudicialBody);
        assert!(bodies.len() >= 2);
    }

    #[test]
    fn test_legal_citations() {
        let e = extractor();
        let text = "nos termos do art. 927, caput do CC e da Lei nº 8.078/1990";
        let report = e.extract_all(text);
        let citations = report.category(EntityCategory::LegalCitation);
        assert!(citations.len() >= 2);
    }

    #[test]
    fn test_malformed_input_yields_empty_collections() {
        let e = extractor();
        let report = e.extract_all("%%%###!!! \u{0007} 9999");
        for category in EntityCategory::all() {
            assert!(report.category(*category).is_empty(), "{} not empty", category);
        }
        assert_eq!(report.stats.total_entities, 0);
    }

    #[test]
    fn test_context_window_width() {
        let e = extractor();
        let filler = "palavra ".repeat(50);
        let text = format!("{}CPF 123.456.789-00 {}", filler, filler);
        let report = e.extract_all(&text);
        let cpfs = report.category(EntityCategory::Cpf);
        assert_eq!(cpfs.len(), 1);
        // Window is the match plus roughly 80 chars of surroundings
        assert!(cpfs[0].context.len() <= 80 + cpfs[0].raw_match.len() + 8);
        assert!(cpfs[0].context.contains("123.456.789-00"));
    }
}
