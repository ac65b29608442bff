//! Coercion of free-form model output into the canonical enumerations.
//!
//! The synonym tables are ordered: the first entry whose key is a substring
//! of the lowercased, trimmed input wins, so earlier entries take priority
//! when keys overlap. Unresolvable input never fails — each function falls
//! back to a fixed default so a single malformed field cannot abort a run.

use serde_json::Value;

use crate::types::ClauseType;

/// Default clause type for unrecognized input.
pub const DEFAULT_CLAUSE_TYPE: ClauseType = ClauseType::Other;
/// Default risk level (medium) for unrecognized input.
pub const DEFAULT_RISK_LEVEL: u8 = 3;
/// Default priority (medium) for unrecognized input.
pub const DEFAULT_PRIORITY: u8 = 2;

/// Accented and unaccented French synonyms, ordered by priority. The
/// confidentiality variants come first so "obligation de confidentialité"
/// resolves to confidentiality, not obligation.
const CLAUSE_TYPE_TABLE: &[(&str, ClauseType)] = &[
    ("confidentialité", ClauseType::Confidentiality),
    ("obligation de confidentialité", ClauseType::Confidentiality),
    ("clause de confidentialité", ClauseType::Confidentiality),
    ("confidentialite", ClauseType::Confidentiality),
    ("obligation", ClauseType::Obligation),
    ("restrictions", ClauseType::Restriction),
    ("restriction", ClauseType::Restriction),
    ("droit", ClauseType::Right),
    ("droits", ClauseType::Right),
    ("résiliation", ClauseType::Termination),
    ("resiliation", ClauseType::Termination),
    ("propriété intellectuelle", ClauseType::IntellectualProperty),
    ("propriete intellectuelle", ClauseType::IntellectualProperty),
    ("responsabilité", ClauseType::Liability),
    ("responsabilite", ClauseType::Liability),
    ("paiement", ClauseType::Payment),
    ("durée", ClauseType::Duration),
    ("duree", ClauseType::Duration),
    ("autre", ClauseType::Other),
];

const PRIORITY_TABLE: &[(&str, u8)] = &[
    ("faible", 1),
    ("basse", 1),
    ("low", 1),
    ("moyenne", 2),
    ("medium", 2),
    ("élevée", 3),
    ("elevee", 3),
    ("haute", 3),
    ("high", 3),
    ("1", 1),
    ("2", 2),
    ("3", 3),
];

const RISK_LEVEL_TABLE: &[(&str, u8)] = &[
    ("très faible", 1),
    ("tres faible", 1),
    ("faible", 2),
    ("moyen", 3),
    ("élevé", 4),
    ("eleve", 4),
    ("très élevé", 5),
    ("tres eleve", 5),
    ("very low", 1),
    ("low", 2),
    ("medium", 3),
    ("high", 4),
    ("very high", 5),
];

/// Normalize a free-form clause type string to the canonical enum.
///
/// Exact canonical values ("termination", "intellectual_property", ...)
/// pass through unchanged; everything else goes through the synonym table.
pub fn normalize_clause_type(raw: &str) -> ClauseType {
    let normalized = raw.to_lowercase();
    let normalized = normalized.trim();

    if let Some(t) = ClauseType::parse(normalized) {
        return t;
    }

    for (key, value) in CLAUSE_TYPE_TABLE {
        if normalized.contains(key) {
            return *value;
        }
    }

    DEFAULT_CLAUSE_TYPE
}

/// Normalize a risk level (integer, numeric string or level word) to [1, 5].
pub fn normalize_risk_level(raw: &Value) -> u8 {
    if let Some(n) = raw.as_i64() {
        if (1..=5).contains(&n) {
            return n as u8;
        }
    }

    if let Some(s) = raw.as_str() {
        if let Ok(n) = s.trim().parse::<i64>() {
            if (1..=5).contains(&n) {
                return n as u8;
            }
        }

        let normalized = s.to_lowercase();
        let normalized = normalized.trim();
        for (key, value) in RISK_LEVEL_TABLE {
            if normalized.contains(key) {
                return *value;
            }
        }
    }

    DEFAULT_RISK_LEVEL
}

/// Normalize a priority (integer, numeric string or priority word) to [1, 3].
pub fn normalize_priority(raw: &Value) -> u8 {
    if let Some(n) = raw.as_i64() {
        if (1..=3).contains(&n) {
            return n as u8;
        }
    }

    if let Some(s) = raw.as_str() {
        if let Ok(n) = s.trim().parse::<i64>() {
            if (1..=3).contains(&n) {
                return n as u8;
            }
        }

        let normalized = s.to_lowercase();
        let normalized = normalized.trim();
        for (key, value) in PRIORITY_TABLE {
            if normalized.contains(key) {
                return *value;
            }
        }
    }

    DEFAULT_PRIORITY
}
