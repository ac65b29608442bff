//! Conversion of raw model output into canonical domain records.
//!
//! The model returns loosely-typed JSON records; each one is converted
//! independently. A record missing a required field is logged and dropped —
//! partial extraction is preferred over failing the pipeline. Untyped
//! values never flow past this module.

use serde_json::Value;
use tracing::warn;

use crate::normalize::{normalize_clause_type, normalize_priority, normalize_risk_level};
use crate::precedent::GENERATIVE_SCORE;
use crate::types::{Clause, ClauseType, Precedent, Recommendation, Risk};

/// Sentinel clause title injected when extraction yields nothing.
pub const SENTINEL_CLAUSE_TITLE: &str = "Document incomplet";

fn required_str<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn optional_str(record: &Value, field: &str) -> Option<String> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn default_str(record: &Value, field: &str) -> String {
    record
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Build canonical clauses from raw extraction records, preserving input
/// order. If nothing survives, a single sentinel clause is injected so
/// every completed analysis has at least one clause.
pub fn build_clauses(raw: &[Value]) -> Vec<Clause> {
    let mut clauses = Vec::with_capacity(raw.len());

    for record in raw {
        let (Some(title), Some(content), Some(analysis)) = (
            required_str(record, "title"),
            required_str(record, "content"),
            required_str(record, "analysis"),
        ) else {
            warn!("dropping clause record with missing fields: {record}");
            continue;
        };
        let Some(raw_type) = required_str(record, "type") else {
            warn!("dropping clause record without a type: {record}");
            continue;
        };
        let Some(raw_risk) = record.get("risk_level") else {
            warn!("dropping clause record without a risk level: {record}");
            continue;
        };

        clauses.push(Clause {
            title: title.to_string(),
            content: content.to_string(),
            clause_type: normalize_clause_type(raw_type),
            risk_level: normalize_risk_level(raw_risk),
            analysis: analysis.to_string(),
        });
    }

    if clauses.is_empty() {
        warn!("no clauses extracted, injecting sentinel clause");
        clauses.push(Clause {
            title: SENTINEL_CLAUSE_TITLE.to_string(),
            content: "Le document ne contient pas de clauses explicites ou elles n'ont pas pu \
                      être extraites."
                .to_string(),
            clause_type: ClauseType::Other,
            risk_level: 3,
            analysis: "Document incomplet ou non structuré. Recommandé d'ajouter des clauses \
                       explicites."
                .to_string(),
        });
    }

    clauses
}

/// Build recommendations from raw generation records, preserving input order.
pub fn build_recommendations(raw: &[Value]) -> Vec<Recommendation> {
    let mut recommendations = Vec::with_capacity(raw.len());

    for record in raw {
        let (Some(title), Some(description)) = (
            required_str(record, "title"),
            required_str(record, "description"),
        ) else {
            warn!("dropping recommendation record with missing fields: {record}");
            continue;
        };
        let Some(raw_priority) = record.get("priority") else {
            warn!("dropping recommendation record without a priority: {record}");
            continue;
        };

        let related_clauses = record
            .get("related_clauses")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        recommendations.push(Recommendation {
            title: title.to_string(),
            description: description.to_string(),
            priority: normalize_priority(raw_priority),
            suggested_text: optional_str(record, "suggested_text"),
            related_clauses,
        });
    }

    recommendations
}

/// Build risks from raw identification records, preserving input order.
pub fn build_risks(raw: &[Value]) -> Vec<Risk> {
    let mut risks = Vec::with_capacity(raw.len());

    for record in raw {
        let (Some(title), Some(description), Some(impact)) = (
            required_str(record, "title"),
            required_str(record, "description"),
            required_str(record, "impact"),
        ) else {
            warn!("dropping risk record with missing fields: {record}");
            continue;
        };
        let Some(raw_level) = record.get("level") else {
            warn!("dropping risk record without a level: {record}");
            continue;
        };

        risks.push(Risk {
            title: title.to_string(),
            description: description.to_string(),
            level: normalize_risk_level(raw_level),
            impact: impact.to_string(),
            mitigation: optional_str(record, "mitigation"),
        });
    }

    risks
}

/// Build generative-fallback precedents. Missing fields default to empty
/// strings rather than dropping the record, and every precedent is tagged
/// with the fixed generative similarity score.
pub fn build_precedents(raw: &[Value]) -> Vec<Precedent> {
    raw.iter()
        .map(|record| Precedent {
            title: default_str(record, "title"),
            description: default_str(record, "description"),
            kind: default_str(record, "type"),
            relevance: default_str(record, "relevance"),
            source: optional_str(record, "source"),
            similarity_score: GENERATIVE_SCORE,
        })
        .collect()
}
