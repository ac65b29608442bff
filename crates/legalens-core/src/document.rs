use anyhow::Result;
use async_trait::async_trait;

/// Source of decoded document text.
///
/// The implementation owns extraction and caching: it returns text already
/// extracted from the underlying file and persists it for reuse, so the
/// pipeline never re-extracts per run. A missing document or unsupported
/// format is an error, which the orchestrator treats as immediately fatal.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn extractable_text(&self, document_id: &str) -> Result<String>;
}
