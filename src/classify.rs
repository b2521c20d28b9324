//! # Document Classification Module
//!
//! ## Purpose
//! Deterministic document classification as an ordered rule table of
//! `(predicate, label)` pairs evaluated in priority order, making precedence
//! and coverage independently testable.
//!
//! ## Input/Output Specification
//! - **Input**: Normalized text
//! - **Output**: A `DocumentClass` label from the first matching rule
//! - **Fallback**: A generic label when no rule matches

use serde::{Deserialize, Serialize};

/// Classification produced by the rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentClass {
    /// Human-readable label, e.g. "sentença"
    pub label: String,
    /// Name of the rule that produced the label
    pub matched_rule: String,
}

/// A single classification rule: keywords that must all appear (any-case)
struct Rule {
    name: &'static str,
    label: &'static str,
    /// The rule fires when any of these markers occurs in the text
    markers: &'static [&'static str],
}

/// Ordered rule table; earlier rules take precedence
const RULES: &[Rule] = &[
    Rule {
        name: "sentenca_header",
        label: "sentença",
        markers: &["sentença", "julgo procedente", "julgo improcedente", "julgo parcialmente procedente"],
    },
    Rule {
        name: "acordao",
        label: "acórdão",
        markers: &["acórdão", "acordam os desembargadores", "relator"],
    },
    Rule {
        name: "decisao_interlocutoria",
        label: "decisão interlocutória",
        markers: &["decisão interlocutória", "decido", "defiro", "indefiro"],
    },
    Rule {
        name: "despacho",
        label: "despacho",
        markers: &["despacho", "intime-se", "cite-se", "manifeste-se"],
    },
    Rule {
        name: "peticao_inicial",
        label: "petição inicial",
        markers: &["petição inicial", "vem respeitosamente", "dos pedidos", "requer a citação"],
    },
    Rule {
        name: "contestacao",
        label: "contestação",
        markers: &["contestação", "preliminarmente", "no mérito"],
    },
    Rule {
        name: "laudo_pericial",
        label: "laudo pericial",
        markers: &["laudo pericial", "quesitos", "perito"],
    },
    Rule {
        name: "certidao",
        label: "certidão",
        markers: &["certidão", "certifico"],
    },
];

const FALLBACK_LABEL: &str = "documento jurídico";

/// Classify a document by the first rule whose marker appears in the text
pub fn classify(text: &str) -> DocumentClass {
    let lowered = text.to_lowercase();

    for rule in RULES {
        if rule.markers.iter().any(|m| lowered.contains(m)) {
            tracing::debug!("Rule '{}' classified document as '{}'", rule.name, rule.label);
            return DocumentClass {
                label: rule.label.to_string(),
                matched_rule: rule.name.to_string(),
            };
        }
    }

    DocumentClass {
        label: FALLBACK_LABEL.to_string(),
        matched_rule: "fallback".to_string(),
    }
}
