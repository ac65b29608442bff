mod documents;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use legalens_core::config::Config;
use legalens_core::db::PgAnalysisStore;
use legalens_core::memory::MemoryProgressMirror;
use legalens_core::progress::ProgressTracker;
use legalens_core::store::AnalysisStore;
use legalens_core::workflow::{ExecutionMode, Orchestrator};
use legalens_llm::anthropic::AnthropicBackend;
use legalens_llm::failover::FailoverChat;
use legalens_llm::openai::OpenAiBackend;
use legalens_llm::{ChatBackend, LlmAnalyzer};
use legalens_retrieval::{OpenAiEmbedder, QdrantIndex};

use documents::FsDocumentStore;

/// Preferred provider first, the rest as failover candidates.
fn provider_order(preferred: &str) -> Vec<&'static str> {
    let mut order = vec!["groq", "openai", "anthropic"];
    if let Some(pos) = order.iter().position(|p| *p == preferred) {
        order.rotate_left(pos);
    }
    order
}

fn build_chat(config: &Config) -> Result<Arc<dyn ChatBackend>> {
    let mut backends: Vec<Arc<dyn ChatBackend>> = Vec::new();

    for provider in provider_order(&config.llm_provider) {
        match provider {
            "groq" if !config.groq_api_key.is_empty() => {
                backends.push(Arc::new(OpenAiBackend::groq(
                    config.groq_api_key.clone(),
                    config.groq_model.clone(),
                )));
            }
            "openai" if !config.openai_api_key.is_empty() => {
                backends.push(Arc::new(OpenAiBackend::new(
                    config.openai_api_key.clone(),
                    config.openai_model.clone(),
                )));
            }
            "anthropic" if !config.anthropic_api_key.is_empty() => {
                backends.push(Arc::new(AnthropicBackend::new(
                    config.anthropic_api_key.clone(),
                    config.anthropic_model.clone(),
                )));
            }
            _ => {}
        }
    }

    if backends.is_empty() {
        bail!("no LLM provider configured (set GROQ_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY)");
    }

    info!(
        providers = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
        "chat providers configured"
    );
    Ok(Arc::new(FailoverChat::new(backends)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "legalens_worker=info,legalens_core=info,legalens_llm=info,legalens_retrieval=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn AnalysisStore> =
        Arc::new(PgAnalysisStore::connect(&config.database_url).await?);
    let mirror = Arc::new(MemoryProgressMirror::new());
    let tracker = ProgressTracker::new(Arc::clone(&store), mirror);

    let chat = build_chat(&config)?;
    let llm = Arc::new(LlmAnalyzer::new(chat));

    let embedder = Arc::new(OpenAiEmbedder::new(
        config.openai_api_key.clone(),
        config.embedding_model.clone(),
    ));
    let index = Arc::new(QdrantIndex::new(
        config.qdrant_url.clone(),
        config.qdrant_collection.clone(),
        embedder,
    ));
    if let Err(e) = index.ensure_collection().await {
        warn!("qdrant collection bootstrap failed (searches will degrade): {e:#}");
    } else if !config.precedents_seed_file.is_empty() {
        match index.seed_from_file(&config.precedents_seed_file).await {
            Ok(count) => info!(count, "seeded precedent index from file"),
            Err(e) => warn!("precedent seeding failed: {e:#}"),
        }
    }

    let orchestrator = Arc::new(
        Orchestrator::new(
            Arc::new(FsDocumentStore::new(config.documents_dir.clone())),
            llm,
            index,
            tracker,
        )
        .with_stage_timeout(Duration::from_secs(config.stage_timeout_s)),
    );

    let mode = if config.parallel_mode {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };
    let in_flight: Arc<Mutex<HashSet<String>>> = Arc::new(Mutex::new(HashSet::new()));

    info!(
        tick_s = config.worker_tick_s,
        max_concurrent = config.worker_max_concurrent,
        ?mode,
        "worker started"
    );

    loop {
        if let Err(e) = tick(&store, &orchestrator, mode, &in_flight, config.worker_max_concurrent).await {
            error!("worker tick error: {e:#}");
        }
        tokio::time::sleep(Duration::from_secs(config.worker_tick_s)).await;
    }
}

/// One dispatch pass: claim pending analyses up to the concurrency cap and
/// spawn a workflow run for each.
async fn tick(
    store: &Arc<dyn AnalysisStore>,
    orchestrator: &Arc<Orchestrator>,
    mode: ExecutionMode,
    in_flight: &Arc<Mutex<HashSet<String>>>,
    max_concurrent: u32,
) -> Result<()> {
    let pending = store.list_pending(max_concurrent as i64).await?;

    for analysis in pending {
        let mut guard = in_flight.lock().await;
        if guard.len() >= max_concurrent as usize {
            break;
        }
        if !guard.insert(analysis.id.clone()) {
            continue;
        }
        drop(guard);

        info!(
            analysis_id = %analysis.id,
            document_id = %analysis.document_id,
            "dispatching analysis"
        );

        let orchestrator = Arc::clone(orchestrator);
        let in_flight = Arc::clone(in_flight);
        tokio::spawn(async move {
            if let Err(e) = orchestrator
                .run(mode, &analysis.id, &analysis.document_id, &analysis.document_type)
                .await
            {
                error!(analysis_id = %analysis.id, "analysis run error: {e:#}");
            }
            in_flight.lock().await.remove(&analysis.id);
        });
    }

    Ok(())
}
