use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// High-level legal-analysis operations backed by a language model.
///
/// Implementations prompt the model for a JSON array embedded in free text
/// and parse it out; a response that cannot be parsed yields `Ok(vec![])`
/// so the pipeline degrades instead of aborting. A transport-level failure
/// (no provider reachable) is a real error and fails the stage.
///
/// Records are returned loosely typed; [`crate::assemble`] converts them
/// into canonical domain records.
#[async_trait]
pub trait LegalLlm: Send + Sync {
    async fn extract_clauses(&self, document_text: &str, document_type: &str)
        -> Result<Vec<Value>>;

    async fn generate_recommendations(
        &self,
        clauses: &[Value],
        document_type: &str,
    ) -> Result<Vec<Value>>;

    async fn identify_risks(&self, clauses: &[Value], document_type: &str) -> Result<Vec<Value>>;

    async fn identify_precedents(
        &self,
        clauses: &[Value],
        document_type: &str,
    ) -> Result<Vec<Value>>;

    async fn generate_summary(
        &self,
        document_text: &str,
        clauses: &[Value],
        risks: &[Value],
        document_type: &str,
    ) -> Result<String>;
}
