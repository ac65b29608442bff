use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use legalens_core::memory::{MemoryAnalysisStore, MemoryProgressMirror};
use legalens_core::progress::{transition_allowed, ProgressTracker};
use legalens_core::store::{AnalysisStore, ProgressMirror};
use legalens_core::types::{AnalysisResults, AnalysisStatus};

fn tracker_with_mirror() -> (ProgressTracker, Arc<MemoryAnalysisStore>, Arc<MemoryProgressMirror>) {
    let store = Arc::new(MemoryAnalysisStore::new());
    let mirror = Arc::new(MemoryProgressMirror::new());
    let tracker = ProgressTracker::new(
        Arc::clone(&store) as Arc<dyn AnalysisStore>,
        Arc::clone(&mirror) as Arc<dyn ProgressMirror>,
    );
    (tracker, store, mirror)
}

struct FailingMirror;

#[async_trait]
impl ProgressMirror for FailingMirror {
    async fn set_status(&self, _analysis_id: &str, _status: AnalysisStatus) -> Result<()> {
        Err(anyhow!("mirror down"))
    }

    async fn set_progress(&self, _analysis_id: &str, _progress: f64) -> Result<()> {
        Err(anyhow!("mirror down"))
    }
}

// ── State machine table ──────────────────────────────────────────────────

#[test]
fn test_transition_table() {
    use AnalysisStatus::*;

    assert!(transition_allowed(Pending, InProgress));
    assert!(transition_allowed(InProgress, Completed));
    assert!(transition_allowed(InProgress, Failed));
    assert!(transition_allowed(Failed, Pending));

    assert!(!transition_allowed(Pending, Completed));
    assert!(!transition_allowed(Pending, Failed));
    assert!(!transition_allowed(Completed, Pending));
    assert!(!transition_allowed(Completed, Failed));
    assert!(!transition_allowed(Failed, InProgress));
    assert!(!transition_allowed(InProgress, Pending));
}

// ── Lifecycle ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_full_lifecycle_to_completed() {
    let (tracker, store, mirror) = tracker_with_mirror();
    let analysis = store.create("doc-1", "nda").await.unwrap();

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    tracker.set_progress(&analysis.id, 0.4).await.unwrap();

    let current = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(current.status, AnalysisStatus::InProgress);
    assert_eq!(current.progress, 0.4);
    assert!(current.processing_time_secs.is_none());

    tracker.complete(&analysis.id, &AnalysisResults::default()).await.unwrap();

    let done = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
    assert_eq!(done.progress, 1.0);
    assert!(done.results.is_some());
    assert!(done.error.is_none());
    assert!(done.processing_time_secs.unwrap() >= 0.0);

    assert_eq!(mirror.status(&analysis.id).await, Some(AnalysisStatus::Completed));
    assert_eq!(mirror.progress(&analysis.id).await, Some(1.0));
}

#[tokio::test]
async fn test_fail_records_error_and_processing_time() {
    let (tracker, store, _mirror) = tracker_with_mirror();
    let analysis = store.create("doc-1", "nda").await.unwrap();

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    tracker.fail(&analysis.id, "stage 'identify_risks' timed out after 120s").await.unwrap();

    let failed = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(failed.status, AnalysisStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("identify_risks"));
    assert!(failed.results.is_none());
    assert!(failed.processing_time_secs.is_some());
}

#[tokio::test]
async fn test_illegal_transitions_are_rejected() {
    let (tracker, store, _mirror) = tracker_with_mirror();
    let analysis = store.create("doc-1", "nda").await.unwrap();

    // pending -> completed is not reachable directly.
    assert!(tracker.complete(&analysis.id, &AnalysisResults::default()).await.is_err());
    assert!(tracker.set_status(&analysis.id, AnalysisStatus::Completed, None).await.is_err());

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    tracker.complete(&analysis.id, &AnalysisResults::default()).await.unwrap();

    // completed is final: no failing, no re-running.
    assert!(tracker.fail(&analysis.id, "late error").await.is_err());
    assert!(tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.is_err());

    let done = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
}

#[tokio::test]
async fn test_unknown_analysis_is_an_error() {
    let (tracker, _store, _mirror) = tracker_with_mirror();
    assert!(tracker.set_status("missing", AnalysisStatus::InProgress, None).await.is_err());
    assert!(tracker.reset_for_retry("missing").await.is_err());
}

// ── Retry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_retry_resets_failed_to_pending() {
    let (tracker, store, mirror) = tracker_with_mirror();
    let analysis = store.create("doc-1", "nda").await.unwrap();

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    tracker.set_progress(&analysis.id, 0.2).await.unwrap();
    tracker.fail(&analysis.id, "extraction impossible").await.unwrap();

    tracker.reset_for_retry(&analysis.id).await.unwrap();

    let reset = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(reset.status, AnalysisStatus::Pending);
    assert_eq!(reset.progress, 0.0);
    assert!(reset.error.is_none());
    assert!(reset.processing_time_secs.is_none());
    assert_eq!(mirror.status(&analysis.id).await, Some(AnalysisStatus::Pending));
}

#[tokio::test]
async fn test_retry_rejected_unless_failed() {
    let (tracker, store, _mirror) = tracker_with_mirror();
    let analysis = store.create("doc-1", "nda").await.unwrap();

    assert!(tracker.reset_for_retry(&analysis.id).await.is_err());

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    assert!(tracker.reset_for_retry(&analysis.id).await.is_err());

    tracker.complete(&analysis.id, &AnalysisResults::default()).await.unwrap();
    assert!(tracker.reset_for_retry(&analysis.id).await.is_err());
}

// ── Mirror isolation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_mirror_failures_never_propagate() {
    let store = Arc::new(MemoryAnalysisStore::new());
    let tracker = ProgressTracker::new(
        Arc::clone(&store) as Arc<dyn AnalysisStore>,
        Arc::new(FailingMirror),
    );
    let analysis = store.create("doc-1", "nda").await.unwrap();

    tracker.set_status(&analysis.id, AnalysisStatus::InProgress, None).await.unwrap();
    tracker.set_progress(&analysis.id, 0.6).await.unwrap();
    tracker.complete(&analysis.id, &AnalysisResults::default()).await.unwrap();

    // The durable store saw every write despite the dead mirror.
    let done = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
    assert_eq!(done.progress, 1.0);
}
