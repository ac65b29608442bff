use anyhow::Result;
use async_trait::async_trait;

use crate::types::Precedent;

/// Similarity search over a precomputed precedent index.
///
/// The implementation is responsible for text-to-vector conversion;
/// returned precedents carry the raw similarity score of the hit.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<Precedent>>;
}
