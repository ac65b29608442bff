use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use legalens_core::document::DocumentStore;
use legalens_core::llm::LegalLlm;
use legalens_core::memory::{MemoryAnalysisStore, MemoryProgressMirror};
use legalens_core::progress::ProgressTracker;
use legalens_core::store::{AnalysisStore, ProgressMirror};
use legalens_core::types::{Analysis, AnalysisStatus, ClauseType, Precedent};
use legalens_core::vector::VectorIndex;
use legalens_core::workflow::{ExecutionMode, Orchestrator, TEXT_EXTRACTION_ERROR};

// ── Mock collaborators ───────────────────────────────────────────────────

struct StaticDocs(&'static str);

#[async_trait]
impl DocumentStore for StaticDocs {
    async fn extractable_text(&self, _document_id: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct MissingDocs;

#[async_trait]
impl DocumentStore for MissingDocs {
    async fn extractable_text(&self, document_id: &str) -> Result<String> {
        Err(anyhow!("document introuvable: {document_id}"))
    }
}

/// Deterministic canned stage outputs, with switchable failure modes and
/// call counters.
struct MockLlm {
    clauses: Vec<Value>,
    recommendations: Vec<Value>,
    risks: Vec<Value>,
    precedents: Vec<Value>,
    summary: String,
    fail_risks: bool,
    fail_extract_once: AtomicBool,
    precedent_calls: AtomicUsize,
}

impl Default for MockLlm {
    fn default() -> Self {
        Self {
            clauses: vec![
                json!({
                    "title": "Obligation de confidentialité",
                    "content": "NDA between A and B",
                    "type": "confidentiality",
                    "risk_level": 4,
                    "analysis": "Engagement de confidentialité réciproque."
                }),
                json!({
                    "title": "Durée de l'accord",
                    "content": "2-year term",
                    "type": "duration",
                    "risk_level": 2,
                    "analysis": "Durée déterminée de deux ans."
                }),
            ],
            recommendations: vec![json!({
                "title": "Préciser les exceptions",
                "description": "Ajouter les exceptions usuelles à la confidentialité.",
                "priority": 2
            })],
            risks: vec![json!({
                "title": "Périmètre trop large",
                "description": "La définition des informations confidentielles est très large.",
                "level": 4,
                "impact": "Obligations difficiles à respecter."
            })],
            precedents: vec![
                json!({
                    "title": "Arrêt de référence",
                    "description": "Affaire comparable.",
                    "type": "jurisprudence",
                    "relevance": "pertinent"
                }),
                json!({
                    "title": "Second précédent",
                    "description": "Autre affaire.",
                    "type": "jurisprudence",
                    "relevance": "pertinent"
                }),
            ],
            summary: "## Résumé\nAccord de confidentialité de deux ans.".to_string(),
            fail_risks: false,
            fail_extract_once: AtomicBool::new(false),
            precedent_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl LegalLlm for MockLlm {
    async fn extract_clauses(
        &self,
        _document_text: &str,
        _document_type: &str,
    ) -> Result<Vec<Value>> {
        // Keeps terminal wall-clock deltas strictly positive.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        if self.fail_extract_once.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("fournisseur LLM indisponible"));
        }
        Ok(self.clauses.clone())
    }

    async fn generate_recommendations(
        &self,
        _clauses: &[Value],
        _document_type: &str,
    ) -> Result<Vec<Value>> {
        Ok(self.recommendations.clone())
    }

    async fn identify_risks(&self, _clauses: &[Value], _document_type: &str) -> Result<Vec<Value>> {
        if self.fail_risks {
            return Err(anyhow!("risk model unavailable"));
        }
        Ok(self.risks.clone())
    }

    async fn identify_precedents(
        &self,
        _clauses: &[Value],
        _document_type: &str,
    ) -> Result<Vec<Value>> {
        self.precedent_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.precedents.clone())
    }

    async fn generate_summary(
        &self,
        _document_text: &str,
        _clauses: &[Value],
        _risks: &[Value],
        _document_type: &str,
    ) -> Result<String> {
        Ok(self.summary.clone())
    }
}

struct MockIndex {
    hits_per_query: usize,
    calls: AtomicUsize,
}

impl MockIndex {
    fn new(hits_per_query: usize) -> Self {
        Self { hits_per_query, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<Precedent>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..self.hits_per_query.min(limit))
            .map(|i| Precedent {
                title: format!("Précédent vectoriel {i} ({query})"),
                description: "Hit vectoriel.".to_string(),
                kind: "jurisprudence".to_string(),
                relevance: "pertinent".to_string(),
                source: None,
                similarity_score: 0.8,
            })
            .collect())
    }
}

struct Harness {
    orchestrator: Orchestrator,
    store: Arc<MemoryAnalysisStore>,
    mirror: Arc<MemoryProgressMirror>,
    llm: Arc<MockLlm>,
    index: Arc<MockIndex>,
}

impl Harness {
    fn new(docs: Arc<dyn DocumentStore>, llm: MockLlm, index: MockIndex) -> Self {
        let store = Arc::new(MemoryAnalysisStore::new());
        let mirror = Arc::new(MemoryProgressMirror::new());
        let llm = Arc::new(llm);
        let index = Arc::new(index);
        let tracker = ProgressTracker::new(
            Arc::clone(&store) as Arc<dyn AnalysisStore>,
            Arc::clone(&mirror) as Arc<dyn ProgressMirror>,
        );
        let orchestrator = Orchestrator::new(
            docs,
            Arc::clone(&llm) as Arc<dyn LegalLlm>,
            Arc::clone(&index) as Arc<dyn VectorIndex>,
            tracker,
        );
        Self { orchestrator, store, mirror, llm, index }
    }

    fn nda() -> Self {
        Self::new(
            Arc::new(StaticDocs("NDA between A and B, 2-year term")),
            MockLlm::default(),
            MockIndex::new(1),
        )
    }

    async fn run(&self, mode: ExecutionMode) -> Analysis {
        let analysis = self.store.create("doc-1", "nda").await.unwrap();
        self.orchestrator
            .run(mode, &analysis.id, &analysis.document_id, &analysis.document_type)
            .await
            .unwrap();
        self.store.get(&analysis.id).await.unwrap().unwrap()
    }
}

// ── Happy path ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequential_run_completes_with_results() {
    let harness = Harness::nda();
    let analysis = harness.run(ExecutionMode::Sequential).await;

    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.progress, 1.0);
    assert!(analysis.error.is_none());
    assert!(analysis.processing_time_secs.unwrap() > 0.0);

    let results = analysis.results.unwrap();
    assert_eq!(results.clauses.len(), 2);
    assert_eq!(results.recommendations.len(), 1);
    assert_eq!(results.risks.len(), 1);
    // 1 high-risk clause x 1 hit (< 3) triggers the fallback: 1 + 2.
    assert_eq!(results.precedents.len(), 3);
    assert!(results.summary.as_deref().unwrap().starts_with("## Résumé"));
    assert_eq!(results.metadata["document_type"], json!("nda"));
    assert!(results.metadata.contains_key("analysis_date"));
}

#[tokio::test]
async fn test_parallel_run_completes_with_results() {
    let harness = Harness::nda();
    let analysis = harness.run(ExecutionMode::Parallel).await;

    assert_eq!(analysis.status, AnalysisStatus::Completed);
    assert_eq!(analysis.progress, 1.0);
    let results = analysis.results.unwrap();
    assert_eq!(results.clauses.len(), 2);
    assert_eq!(results.precedents.len(), 3);
    assert!(results.summary.is_some());
}

#[tokio::test]
async fn test_sequential_and_parallel_produce_identical_results() {
    let sequential = Harness::nda().run(ExecutionMode::Sequential).await;
    let parallel = Harness::nda().run(ExecutionMode::Parallel).await;

    let seq = sequential.results.unwrap();
    let par = parallel.results.unwrap();

    assert_eq!(seq.clauses, par.clauses);
    assert_eq!(seq.recommendations, par.recommendations);
    assert_eq!(seq.risks, par.risks);
    assert_eq!(seq.summary, par.summary);

    // Precedent ordering may differ between modes; content may not.
    let sort_key = |p: &Precedent| (p.title.clone(), p.similarity_score.to_string());
    let mut seq_precedents = seq.precedents.clone();
    let mut par_precedents = par.precedents.clone();
    seq_precedents.sort_by_key(sort_key);
    par_precedents.sort_by_key(sort_key);
    assert_eq!(seq_precedents, par_precedents);
}

#[tokio::test]
async fn test_mirror_tracks_terminal_state() {
    let harness = Harness::nda();
    let analysis = harness.run(ExecutionMode::Sequential).await;

    assert_eq!(harness.mirror.status(&analysis.id).await, Some(AnalysisStatus::Completed));
    assert_eq!(harness.mirror.progress(&analysis.id).await, Some(1.0));
}

// ── Precedent routing ────────────────────────────────────────────────────

#[tokio::test]
async fn test_sequential_skips_fallback_when_vector_hits_suffice() {
    let mut llm = MockLlm::default();
    // Two high-risk clauses so vector search yields 2 x 2 = 4 hits.
    llm.clauses = vec![
        json!({ "title": "A", "content": "a", "type": "liability", "risk_level": 5, "analysis": "…" }),
        json!({ "title": "B", "content": "b", "type": "liability", "risk_level": 4, "analysis": "…" }),
    ];
    let harness = Harness::new(Arc::new(StaticDocs("contrat")), llm, MockIndex::new(2));

    let analysis = harness.run(ExecutionMode::Sequential).await;
    let results = analysis.results.unwrap();

    assert_eq!(results.precedents.len(), 4);
    assert_eq!(harness.index.calls.load(Ordering::SeqCst), 2);
    assert_eq!(harness.llm.precedent_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_parallel_discards_eagerly_launched_fallback_when_hits_suffice() {
    let mut llm = MockLlm::default();
    llm.clauses = vec![
        json!({ "title": "A", "content": "a", "type": "liability", "risk_level": 5, "analysis": "…" }),
        json!({ "title": "B", "content": "b", "type": "liability", "risk_level": 4, "analysis": "…" }),
    ];
    let harness = Harness::new(Arc::new(StaticDocs("contrat")), llm, MockIndex::new(2));

    let analysis = harness.run(ExecutionMode::Parallel).await;
    let results = analysis.results.unwrap();

    // The fallback task ran (launched alongside the searches) but its
    // output was not merged: every precedent is a vector hit.
    assert_eq!(harness.llm.precedent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.precedents.len(), 4);
    assert!(results.precedents.iter().all(|p| p.similarity_score == 0.8));
}

#[tokio::test]
async fn test_no_high_risk_clauses_skips_vector_search_entirely() {
    let mut llm = MockLlm::default();
    llm.clauses = vec![json!({
        "title": "Durée", "content": "2 ans", "type": "duration", "risk_level": 2, "analysis": "…"
    })];
    let harness = Harness::new(Arc::new(StaticDocs("contrat")), llm, MockIndex::new(2));

    let analysis = harness.run(ExecutionMode::Sequential).await;
    let results = analysis.results.unwrap();

    assert_eq!(harness.index.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.llm.precedent_calls.load(Ordering::SeqCst), 1);
    assert_eq!(results.precedents.len(), 2);
    assert!(results.precedents.iter().all(|p| p.similarity_score == 0.95));
}

#[tokio::test]
async fn test_parallel_vector_subtask_failure_is_isolated() {
    struct BrokenIndex;

    #[async_trait]
    impl VectorIndex for BrokenIndex {
        async fn search_similar(&self, _query: &str, _limit: usize) -> Result<Vec<Precedent>> {
            Err(anyhow!("index hors service"))
        }
    }

    let store = Arc::new(MemoryAnalysisStore::new());
    let mirror = Arc::new(MemoryProgressMirror::new());
    let tracker = ProgressTracker::new(
        Arc::clone(&store) as Arc<dyn AnalysisStore>,
        Arc::clone(&mirror) as Arc<dyn ProgressMirror>,
    );
    let orchestrator = Orchestrator::new(
        Arc::new(StaticDocs("contrat")),
        Arc::new(MockLlm::default()),
        Arc::new(BrokenIndex),
        tracker,
    );

    let analysis = store.create("doc-1", "nda").await.unwrap();
    orchestrator
        .run(ExecutionMode::Parallel, &analysis.id, "doc-1", "nda")
        .await
        .unwrap();

    // Searches failed (zero hits), so the fallback fills in and the run
    // still completes.
    let done = store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
    assert_eq!(done.results.unwrap().precedents.len(), 2);
}

// ── Failure classification ───────────────────────────────────────────────

#[tokio::test]
async fn test_extraction_failure_is_immediately_terminal() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let harness = Harness::new(Arc::new(MissingDocs), MockLlm::default(), MockIndex::new(1));
        let analysis = harness.run(mode).await;

        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert_eq!(analysis.error.as_deref(), Some(TEXT_EXTRACTION_ERROR));
        assert!(analysis.results.is_none());
        // Progress stays at the checkpoint that preceded extraction.
        assert_eq!(analysis.progress, 0.1);
        // No downstream stage ran.
        assert_eq!(harness.llm.precedent_calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.index.calls.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn test_stage_error_marks_failed_with_trace() {
    for mode in [ExecutionMode::Sequential, ExecutionMode::Parallel] {
        let mut llm = MockLlm::default();
        llm.fail_risks = true;
        let harness = Harness::new(Arc::new(StaticDocs("contrat")), llm, MockIndex::new(1));
        let analysis = harness.run(mode).await;

        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert!(analysis.error.as_deref().unwrap().contains("risk model unavailable"));
        assert!(analysis.results.is_none());
        assert!(analysis.processing_time_secs.is_some());
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_run_can_be_retried_to_completion() {
    let mut llm = MockLlm::default();
    llm.fail_extract_once = AtomicBool::new(true);
    let harness = Harness::new(Arc::new(StaticDocs("NDA between A and B")), llm, MockIndex::new(1));

    let analysis = harness.store.create("doc-1", "nda").await.unwrap();
    harness
        .orchestrator
        .run(ExecutionMode::Sequential, &analysis.id, "doc-1", "nda")
        .await
        .unwrap();
    let failed = harness.store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(failed.status, AnalysisStatus::Failed);
    assert!(failed.error.is_some());

    // External retry: reset to pending, then re-run the whole workflow.
    harness.orchestrator.tracker().reset_for_retry(&analysis.id).await.unwrap();
    let pending = harness.store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(pending.status, AnalysisStatus::Pending);

    harness
        .orchestrator
        .run(ExecutionMode::Sequential, &analysis.id, "doc-1", "nda")
        .await
        .unwrap();
    let done = harness.store.get(&analysis.id).await.unwrap().unwrap();
    assert_eq!(done.status, AnalysisStatus::Completed);
    assert!(done.processing_time_secs.unwrap() > 0.0);
    assert!(done.results.is_some());
    assert!(done.error.is_none());
}

// ── Degraded extraction ──────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_clause_extraction_completes_with_sentinel() {
    let mut llm = MockLlm::default();
    llm.clauses = Vec::new();
    let harness = Harness::new(Arc::new(StaticDocs("texte libre")), llm, MockIndex::new(1));

    let analysis = harness.run(ExecutionMode::Sequential).await;
    assert_eq!(analysis.status, AnalysisStatus::Completed);

    let results = analysis.results.unwrap();
    assert_eq!(results.clauses.len(), 1);
    assert_eq!(results.clauses[0].title, "Document incomplet");
    assert_eq!(results.clauses[0].clause_type, ClauseType::Other);
    assert_eq!(results.clauses[0].risk_level, 3);
}

// ── End-to-end scenario ──────────────────────────────────────────────────

#[tokio::test]
async fn test_nda_end_to_end() {
    let harness = Harness::nda();
    let analysis = harness.run(ExecutionMode::Parallel).await;

    assert_eq!(analysis.status, AnalysisStatus::Completed);
    let results = analysis.results.unwrap();
    assert!(results
        .clauses
        .iter()
        .any(|c| matches!(c.clause_type, ClauseType::Confidentiality | ClauseType::Duration)));
    assert!(!results.summary.as_deref().unwrap().is_empty());
    assert_eq!(results.metadata["document_type"], json!("nda"));
}
