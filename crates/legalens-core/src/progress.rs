//! Durable status/progress tracking for analysis runs.
//!
//! Every write lands in the durable store first (source of truth) and is
//! then mirrored best-effort to a low-latency store for fast polling;
//! mirror failures are logged, never propagated. The tracker owns the
//! status state machine: `pending → in_progress → {completed, failed}`,
//! with `failed → pending` reachable only through [`ProgressTracker::reset_for_retry`].

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::store::{AnalysisStore, ProgressMirror};
use crate::types::{Analysis, AnalysisResults, AnalysisStatus};

/// Whether a direct status transition is legal. Retry (`failed → pending`)
/// is included here but only [`ProgressTracker::reset_for_retry`] takes it;
/// a running workflow never transitions backward.
pub fn transition_allowed(from: AnalysisStatus, to: AnalysisStatus) -> bool {
    use AnalysisStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress) | (InProgress, Completed) | (InProgress, Failed) | (Failed, Pending)
    )
}

#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn AnalysisStore>,
    mirror: Arc<dyn ProgressMirror>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn AnalysisStore>, mirror: Arc<dyn ProgressMirror>) -> Self {
        Self { store, mirror }
    }

    pub fn store(&self) -> &Arc<dyn AnalysisStore> {
        &self.store
    }

    async fn load(&self, analysis_id: &str) -> Result<Analysis> {
        self.store
            .get(analysis_id)
            .await?
            .with_context(|| format!("analysis not found: {analysis_id}"))
    }

    async fn mirror_status(&self, analysis_id: &str, status: AnalysisStatus) {
        if let Err(e) = self.mirror.set_status(analysis_id, status).await {
            warn!(analysis_id, "progress mirror status write failed: {e:#}");
        }
    }

    /// Transition an analysis to a new status. Terminal transitions compute
    /// and persist the wall-clock processing time.
    pub async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let analysis = self.load(analysis_id).await?;
        if !transition_allowed(analysis.status, status) {
            bail!(
                "illegal status transition for analysis {analysis_id}: {} -> {}",
                analysis.status,
                status
            );
        }

        let processing_time = status
            .is_terminal()
            .then(|| elapsed_secs_since(analysis.created_at));

        self.store
            .set_status(analysis_id, status, error, processing_time)
            .await
            .context("durable status write")?;

        if let Some(secs) = processing_time {
            info!(analysis_id, status = %status, processing_time_secs = secs, "analysis reached terminal state");
        }

        self.mirror_status(analysis_id, status).await;
        Ok(())
    }

    /// Record a checkpoint progress fraction in [0.0, 1.0].
    pub async fn set_progress(&self, analysis_id: &str, fraction: f64) -> Result<()> {
        debug!(analysis_id, fraction, "progress checkpoint");
        self.store
            .set_progress(analysis_id, fraction)
            .await
            .context("durable progress write")?;

        if let Err(e) = self.mirror.set_progress(analysis_id, fraction).await {
            warn!(analysis_id, "progress mirror write failed: {e:#}");
        }
        Ok(())
    }

    /// Terminal success: persist results, `completed`, progress 1.0 and the
    /// processing time in one durable write, then mirror.
    pub async fn complete(&self, analysis_id: &str, results: &AnalysisResults) -> Result<()> {
        let analysis = self.load(analysis_id).await?;
        if !transition_allowed(analysis.status, AnalysisStatus::Completed) {
            bail!(
                "illegal status transition for analysis {analysis_id}: {} -> completed",
                analysis.status
            );
        }

        let secs = elapsed_secs_since(analysis.created_at);
        self.store
            .complete(analysis_id, results, secs)
            .await
            .context("durable results write")?;

        info!(analysis_id, processing_time_secs = secs, "analysis completed");

        self.mirror_status(analysis_id, AnalysisStatus::Completed).await;
        if let Err(e) = self.mirror.set_progress(analysis_id, 1.0).await {
            warn!(analysis_id, "progress mirror write failed: {e:#}");
        }
        Ok(())
    }

    /// Terminal failure with the captured error trace as the reason.
    pub async fn fail(&self, analysis_id: &str, error: &str) -> Result<()> {
        self.set_status(analysis_id, AnalysisStatus::Failed, Some(error))
            .await
    }

    /// Reset a failed analysis to `pending` for a full re-run. The only
    /// backward transition, and callable only from `failed` — a completed
    /// analysis can never be reset.
    pub async fn reset_for_retry(&self, analysis_id: &str) -> Result<()> {
        let analysis = self.load(analysis_id).await?;
        if analysis.status != AnalysisStatus::Failed {
            bail!(
                "analysis {analysis_id} is {}, only failed analyses can be retried",
                analysis.status
            );
        }

        self.store
            .set_status(analysis_id, AnalysisStatus::Pending, None, None)
            .await
            .context("durable retry reset")?;
        self.store
            .set_progress(analysis_id, 0.0)
            .await
            .context("durable retry progress reset")?;

        info!(analysis_id, "failed analysis reset to pending for retry");

        self.mirror_status(analysis_id, AnalysisStatus::Pending).await;
        if let Err(e) = self.mirror.set_progress(analysis_id, 0.0).await {
            warn!(analysis_id, "progress mirror write failed: {e:#}");
        }
        Ok(())
    }
}

fn elapsed_secs_since(created_at: chrono::DateTime<Utc>) -> f64 {
    (Utc::now() - created_at).num_milliseconds() as f64 / 1000.0
}
