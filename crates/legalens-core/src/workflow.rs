//! Top-level analysis workflow driver.
//!
//! Two execution modes produce the same results given the same stage
//! outputs: sequential runs every stage in order; parallel overlaps the
//! stages that only depend on clause data (recommendations ∥ risks) and
//! the precedent/summary group. Progress checkpoints are fixed fractions
//! written at stage boundaries, not measured completion.
//!
//! Error classification: a text-extraction failure is immediately terminal
//! with a fixed reason and no further stages. Any other stage error is
//! caught once at the top, recorded with its full context chain as the
//! analysis error, and marks the run failed; no partial results are ever
//! persisted. The orchestrator performs no per-stage retries — retry is
//! "reset to pending and re-run the whole workflow", an external operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::assemble;
use crate::document::DocumentStore;
use crate::llm::LegalLlm;
use crate::precedent::{self, MAX_CLAUSE_SEARCHES, PER_CLAUSE_LIMIT};
use crate::progress::ProgressTracker;
use crate::types::{AnalysisResults, AnalysisStatus, Clause, Precedent};
use crate::vector::VectorIndex;

/// Per-stage timeout default; a hung external call fails the run instead
/// of hanging it forever.
pub const DEFAULT_STAGE_TIMEOUT_S: u64 = 120;

/// Terminal error recorded when document text cannot be extracted.
pub const TEXT_EXTRACTION_ERROR: &str = "Impossible d'extraire le texte du document";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

pub struct Orchestrator {
    documents: Arc<dyn DocumentStore>,
    llm: Arc<dyn LegalLlm>,
    index: Arc<dyn VectorIndex>,
    tracker: ProgressTracker,
    stage_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        llm: Arc<dyn LegalLlm>,
        index: Arc<dyn VectorIndex>,
        tracker: ProgressTracker,
    ) -> Self {
        Self {
            documents,
            llm,
            index,
            tracker,
            stage_timeout: Duration::from_secs(DEFAULT_STAGE_TIMEOUT_S),
        }
    }

    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// The tracker driving this orchestrator's status writes; also the
    /// handle external callers use for retry resets.
    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Run the full workflow for one analysis. Stage errors are classified
    /// here: the run is marked `failed` and `Ok(())` is returned, so the
    /// caller only sees an `Err` when the durable store itself is broken.
    pub async fn run(
        &self,
        mode: ExecutionMode,
        analysis_id: &str,
        document_id: &str,
        document_type: &str,
    ) -> Result<()> {
        info!(analysis_id, document_id, ?mode, "starting analysis workflow");

        let outcome = match mode {
            ExecutionMode::Sequential => {
                self.run_sequential(analysis_id, document_id, document_type).await
            }
            ExecutionMode::Parallel => {
                self.run_parallel(analysis_id, document_id, document_type).await
            }
        };

        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                // Full context chain (and backtrace when enabled) becomes
                // the user-visible failure reason.
                let trace = format!("{e:?}");
                error!(analysis_id, "analysis workflow failed: {e:#}");
                self.tracker.fail(analysis_id, &trace).await
            }
        }
    }

    async fn run_sequential(
        &self,
        analysis_id: &str,
        document_id: &str,
        document_type: &str,
    ) -> Result<()> {
        self.tracker
            .set_status(analysis_id, AnalysisStatus::InProgress, None)
            .await?;
        self.tracker.set_progress(analysis_id, 0.1).await?;

        let Some(document_text) = self.extract_text(analysis_id, document_id).await? else {
            return Ok(());
        };
        self.tracker.set_progress(analysis_id, 0.2).await?;

        info!(analysis_id, "extracting clauses");
        let raw_clauses = self
            .stage(
                "extract_clauses",
                self.llm.extract_clauses(&document_text, document_type),
            )
            .await?;
        let clauses = assemble::build_clauses(&raw_clauses);
        self.tracker.set_progress(analysis_id, 0.4).await?;

        info!(analysis_id, "generating recommendations");
        let raw_recommendations = self
            .stage(
                "generate_recommendations",
                self.llm.generate_recommendations(&raw_clauses, document_type),
            )
            .await?;
        let recommendations = assemble::build_recommendations(&raw_recommendations);
        self.tracker.set_progress(analysis_id, 0.6).await?;

        info!(analysis_id, "identifying risks");
        let raw_risks = self
            .stage("identify_risks", self.llm.identify_risks(&raw_clauses, document_type))
            .await?;
        let risks = assemble::build_risks(&raw_risks);
        self.tracker.set_progress(analysis_id, 0.8).await?;

        info!(analysis_id, "discovering precedents");
        let precedents = self
            .stage(
                "discover_precedents",
                precedent::discover(&clauses, self.index.as_ref(), || async {
                    let raw = self.llm.identify_precedents(&raw_clauses, document_type).await?;
                    Ok(assemble::build_precedents(&raw))
                }),
            )
            .await?;

        info!(analysis_id, "generating summary");
        let summary = self
            .stage(
                "generate_summary",
                self.llm
                    .generate_summary(&document_text, &raw_clauses, &raw_risks, document_type),
            )
            .await?;

        let results = AnalysisResults {
            clauses,
            recommendations,
            risks,
            precedents,
            summary: Some(summary),
            metadata: results_metadata(document_type),
        };

        self.tracker.complete(analysis_id, &results).await?;
        info!(analysis_id, "analysis workflow completed");
        Ok(())
    }

    async fn run_parallel(
        &self,
        analysis_id: &str,
        document_id: &str,
        document_type: &str,
    ) -> Result<()> {
        self.tracker
            .set_status(analysis_id, AnalysisStatus::InProgress, None)
            .await?;
        self.tracker.set_progress(analysis_id, 0.1).await?;

        let Some(document_text) = self.extract_text(analysis_id, document_id).await? else {
            return Ok(());
        };
        self.tracker.set_progress(analysis_id, 0.2).await?;

        info!(analysis_id, "extracting clauses");
        let raw_clauses = self
            .stage(
                "extract_clauses",
                self.llm.extract_clauses(&document_text, document_type),
            )
            .await?;
        let clauses = assemble::build_clauses(&raw_clauses);
        self.tracker.set_progress(analysis_id, 0.4).await?;

        // Recommendations and risks both depend only on clause data; run
        // them concurrently and join before either error propagates, so a
        // failing sibling never cancels the other.
        info!(analysis_id, "generating recommendations and risks concurrently");
        let (rec_out, risk_out) = tokio::join!(
            self.stage(
                "generate_recommendations",
                self.llm.generate_recommendations(&raw_clauses, document_type),
            ),
            self.stage("identify_risks", self.llm.identify_risks(&raw_clauses, document_type)),
        );
        let raw_recommendations = rec_out?;
        let raw_risks = risk_out?;
        let recommendations = assemble::build_recommendations(&raw_recommendations);
        let risks = assemble::build_risks(&raw_risks);
        self.tracker.set_progress(analysis_id, 0.7).await?;

        // Precedent discovery and summary generation overlap. The
        // generative fallback launches alongside the vector searches; its
        // output is only merged in if the vector hits come up short once
        // every task has joined.
        info!(analysis_id, "discovering precedents and generating summary concurrently");

        let high_risk: Vec<Clause> = precedent::high_risk_clauses(&clauses)
            .into_iter()
            .cloned()
            .collect();
        let mut search_tasks: Vec<JoinHandle<Result<Vec<Precedent>>>> = Vec::new();
        if !high_risk.is_empty() {
            info!(
                analysis_id,
                count = high_risk.len(),
                "vector search over high-risk clauses"
            );
            for clause in high_risk.into_iter().take(MAX_CLAUSE_SEARCHES) {
                let index = Arc::clone(&self.index);
                let timeout = self.stage_timeout;
                search_tasks.push(tokio::spawn(async move {
                    stage_timeout(
                        timeout,
                        "search_precedents",
                        index.search_similar(&clause.content, PER_CLAUSE_LIMIT),
                    )
                    .await
                }));
            }
        }

        let fallback_task = {
            let llm = Arc::clone(&self.llm);
            let raw = raw_clauses.clone();
            let doc_type = document_type.to_string();
            let timeout = self.stage_timeout;
            tokio::spawn(async move {
                stage_timeout(timeout, "identify_precedents", llm.identify_precedents(&raw, &doc_type))
                    .await
            })
        };

        let summary_task = {
            let llm = Arc::clone(&self.llm);
            let text = document_text.clone();
            let raw_c = raw_clauses.clone();
            let raw_r = raw_risks.clone();
            let doc_type = document_type.to_string();
            let timeout = self.stage_timeout;
            tokio::spawn(async move {
                stage_timeout(
                    timeout,
                    "generate_summary",
                    llm.generate_summary(&text, &raw_c, &raw_r, &doc_type),
                )
                .await
            })
        };

        // Join barrier for the vector group. A failed sub-task contributes
        // zero results for its clause, never a workflow failure.
        let mut vector_hits = Vec::new();
        for task in search_tasks {
            match task.await {
                Ok(Ok(hits)) => vector_hits.extend(hits),
                Ok(Err(e)) => warn!(analysis_id, "precedent search task failed: {e:#}"),
                Err(e) => warn!(analysis_id, "precedent search task panicked: {e}"),
            }
        }

        let fallback = match fallback_task.await {
            Ok(result) => result.map(|raw| assemble::build_precedents(&raw)),
            Err(e) => Err(anyhow!("generative precedent task panicked: {e}")),
        };
        let precedents = precedent::merge_fallback(vector_hits, fallback);

        let summary = match summary_task.await {
            Ok(result) => result?,
            Err(e) => return Err(anyhow!("summary task panicked: {e}")),
        };
        self.tracker.set_progress(analysis_id, 0.9).await?;

        let results = AnalysisResults {
            clauses,
            recommendations,
            risks,
            precedents,
            summary: Some(summary),
            metadata: results_metadata(document_type),
        };

        self.tracker.complete(analysis_id, &results).await?;
        info!(analysis_id, "analysis workflow completed");
        Ok(())
    }

    /// Extract document text, or mark the run failed with the fixed input
    /// error. Returns `Ok(None)` when the run was terminated here.
    async fn extract_text(&self, analysis_id: &str, document_id: &str) -> Result<Option<String>> {
        match self
            .stage("extract_text", self.documents.extractable_text(document_id))
            .await
        {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                error!(analysis_id, document_id, "text extraction failed: {e:#}");
                self.tracker.fail(analysis_id, TEXT_EXTRACTION_ERROR).await?;
                Ok(None)
            }
        }
    }

    async fn stage<T>(&self, name: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        stage_timeout(self.stage_timeout, name, fut).await
    }
}

async fn stage_timeout<T>(
    timeout: Duration,
    stage: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!("stage '{stage}' timed out after {}s", timeout.as_secs())),
    }
}

fn results_metadata(document_type: &str) -> serde_json::Map<String, Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert(
        "document_type".to_string(),
        Value::String(document_type.to_string()),
    );
    metadata.insert(
        "analysis_date".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    metadata
}
