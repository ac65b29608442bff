//! Precedent discovery: vector similarity over high-risk clauses with a
//! generative backstop.
//!
//! Vector hits are never deduplicated across the per-clause searches; a
//! precedent relevant to two clauses appears twice. Downstream consumers
//! rely on the current cardinality, so this is preserved as-is.

use std::future::Future;

use anyhow::Result;
use tracing::{info, warn};

use crate::types::{Clause, Precedent};
use crate::vector::VectorIndex;

/// Clauses at or above this risk level drive targeted precedent search.
pub const HIGH_RISK_THRESHOLD: u8 = 4;
/// At most this many high-risk clauses are searched per run.
pub const MAX_CLAUSE_SEARCHES: usize = 3;
/// Vector hits requested per searched clause.
pub const PER_CLAUSE_LIMIT: usize = 2;
/// Below this many accumulated precedents, the generative fallback fires.
pub const MIN_PRECEDENTS: usize = 3;
/// Fixed similarity score for model-asserted (unverified) precedents.
pub const GENERATIVE_SCORE: f64 = 0.95;

/// Clauses eligible for targeted vector search.
pub fn high_risk_clauses(clauses: &[Clause]) -> Vec<&Clause> {
    clauses
        .iter()
        .filter(|c| c.risk_level >= HIGH_RISK_THRESHOLD)
        .collect()
}

/// Merge vector hits with an already-obtained generative fallback result.
///
/// The threshold check happens once: if fewer than [`MIN_PRECEDENTS`]
/// vector hits accumulated, ALL fallback precedents are appended, however
/// many hits already exist. A failed fallback contributes zero precedents
/// and never fails the workflow.
pub fn merge_fallback(
    mut vector_hits: Vec<Precedent>,
    fallback: Result<Vec<Precedent>>,
) -> Vec<Precedent> {
    if vector_hits.len() >= MIN_PRECEDENTS {
        return vector_hits;
    }

    match fallback {
        Ok(generated) => {
            info!(count = generated.len(), "merging generative precedents");
            vector_hits.extend(generated);
        }
        Err(e) => warn!("generative precedent fallback failed: {e:#}"),
    }

    vector_hits
}

/// Sequential-mode discovery: search the index for each high-risk clause
/// (capped), then invoke the fallback only if too few hits accumulated.
///
/// With no high-risk clauses the vector search is skipped entirely and the
/// fallback always fires. Vector search errors propagate; fallback errors
/// are swallowed by [`merge_fallback`].
pub async fn discover<F, Fut>(
    clauses: &[Clause],
    index: &dyn VectorIndex,
    fallback: F,
) -> Result<Vec<Precedent>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<Precedent>>>,
{
    let mut hits = Vec::new();

    let high_risk = high_risk_clauses(clauses);
    if !high_risk.is_empty() {
        info!(count = high_risk.len(), "vector search over high-risk clauses");
        for clause in high_risk.into_iter().take(MAX_CLAUSE_SEARCHES) {
            hits.extend(index.search_similar(&clause.content, PER_CLAUSE_LIMIT).await?);
        }
    }

    if hits.len() >= MIN_PRECEDENTS {
        return Ok(hits);
    }

    info!(
        hits = hits.len(),
        "too few vector precedents, invoking generative fallback"
    );
    Ok(merge_fallback(hits, fallback().await))
}
