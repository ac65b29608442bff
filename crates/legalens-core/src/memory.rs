//! In-memory store and mirror implementations.
//!
//! Used by the integration tests and as the worker's low-latency progress
//! mirror. Both are per-id maps behind an async `RwLock`; they implement
//! the same contracts as the durable implementations.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{AnalysisStore, ProgressMirror};
use crate::types::{Analysis, AnalysisResults, AnalysisStatus};

#[derive(Default)]
pub struct MemoryAnalysisStore {
    analyses: RwLock<HashMap<String, Analysis>>,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn create(&self, document_id: &str, document_type: &str) -> Result<Analysis> {
        let now = Utc::now();
        let analysis = Analysis {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            document_type: document_type.to_string(),
            status: AnalysisStatus::Pending,
            progress: 0.0,
            results: None,
            error: None,
            created_at: now,
            updated_at: now,
            processing_time_secs: None,
        };
        self.analyses
            .write()
            .await
            .insert(analysis.id.clone(), analysis.clone());
        Ok(analysis)
    }

    async fn get(&self, analysis_id: &str) -> Result<Option<Analysis>> {
        Ok(self.analyses.read().await.get(analysis_id).cloned())
    }

    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error: Option<&str>,
        processing_time_secs: Option<f64>,
    ) -> Result<()> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses
            .get_mut(analysis_id)
            .with_context(|| format!("analysis not found: {analysis_id}"))?;
        analysis.status = status;
        analysis.error = error.map(str::to_string);
        analysis.processing_time_secs = processing_time_secs;
        analysis.updated_at = Utc::now();
        Ok(())
    }

    async fn set_progress(&self, analysis_id: &str, progress: f64) -> Result<()> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses
            .get_mut(analysis_id)
            .with_context(|| format!("analysis not found: {analysis_id}"))?;
        analysis.progress = progress;
        analysis.updated_at = Utc::now();
        Ok(())
    }

    async fn complete(
        &self,
        analysis_id: &str,
        results: &AnalysisResults,
        processing_time_secs: f64,
    ) -> Result<()> {
        let mut analyses = self.analyses.write().await;
        let analysis = analyses
            .get_mut(analysis_id)
            .with_context(|| format!("analysis not found: {analysis_id}"))?;
        analysis.status = AnalysisStatus::Completed;
        analysis.progress = 1.0;
        analysis.results = Some(results.clone());
        analysis.error = None;
        analysis.processing_time_secs = Some(processing_time_secs);
        analysis.updated_at = Utc::now();
        Ok(())
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Analysis>> {
        let analyses = self.analyses.read().await;
        let mut pending: Vec<Analysis> = analyses
            .values()
            .filter(|a| a.status == AnalysisStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }
}

/// Process-local progress mirror for fast polling.
#[derive(Default)]
pub struct MemoryProgressMirror {
    statuses: RwLock<HashMap<String, AnalysisStatus>>,
    progress: RwLock<HashMap<String, f64>>,
}

impl MemoryProgressMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status(&self, analysis_id: &str) -> Option<AnalysisStatus> {
        self.statuses.read().await.get(analysis_id).copied()
    }

    pub async fn progress(&self, analysis_id: &str) -> Option<f64> {
        self.progress.read().await.get(analysis_id).copied()
    }
}

#[async_trait]
impl ProgressMirror for MemoryProgressMirror {
    async fn set_status(&self, analysis_id: &str, status: AnalysisStatus) -> Result<()> {
        self.statuses
            .write()
            .await
            .insert(analysis_id.to_string(), status);
        Ok(())
    }

    async fn set_progress(&self, analysis_id: &str, progress: f64) -> Result<()> {
        self.progress
            .write()
            .await
            .insert(analysis_id.to_string(), progress);
        Ok(())
    }
}
