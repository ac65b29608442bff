use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use legalens_core::document::DocumentStore;

/// Document store over a directory of pre-extracted text files
/// (`<root>/<document_id>.txt`). Extraction from PDF/Word happens upstream
/// at upload time; the worker only ever reads the stored text.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn extractable_text(&self, document_id: &str) -> Result<String> {
        if document_id.contains('/') || document_id.contains("..") {
            bail!("invalid document id: {document_id}");
        }
        let path = self.root.join(format!("{document_id}.txt"));
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("no extractable text for document {document_id}"))?;
        if text.trim().is_empty() {
            bail!("document {document_id} has empty text content");
        }
        Ok(text)
    }
}
