use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Analysis, AnalysisResults, AnalysisStatus};

/// Durable storage for analysis records — the source of truth.
///
/// Per-id updates must not require cross-analysis locking; each workflow
/// run owns exactly one record. Writes go through
/// [`crate::progress::ProgressTracker`], which enforces the status state
/// machine on top of this contract.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Create a new analysis in `pending` with progress 0.0.
    async fn create(&self, document_id: &str, document_type: &str) -> Result<Analysis>;

    async fn get(&self, analysis_id: &str) -> Result<Option<Analysis>>;

    /// Update status (and optionally the error string and processing time).
    /// Passing `error: None` clears any stored error.
    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error: Option<&str>,
        processing_time_secs: Option<f64>,
    ) -> Result<()>;

    async fn set_progress(&self, analysis_id: &str, progress: f64) -> Result<()>;

    /// Terminal success: persist results, `completed`, progress 1.0 and the
    /// processing time in a single update, so results are never visible on
    /// a non-completed record.
    async fn complete(
        &self,
        analysis_id: &str,
        results: &AnalysisResults,
        processing_time_secs: f64,
    ) -> Result<()>;

    /// Oldest-first `pending` analyses, for worker dispatch.
    async fn list_pending(&self, limit: i64) -> Result<Vec<Analysis>>;
}

/// Best-effort low-latency mirror of status/progress for fast polling.
///
/// Mirror failures are logged and swallowed by the tracker; the durable
/// store remains the source of truth.
#[async_trait]
pub trait ProgressMirror: Send + Sync {
    async fn set_status(&self, analysis_id: &str, status: AnalysisStatus) -> Result<()>;

    async fn set_progress(&self, analysis_id: &str, progress: f64) -> Result<()>;
}
