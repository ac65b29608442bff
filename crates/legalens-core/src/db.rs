//! Postgres-backed durable analysis store.
//!
//! One row per analysis; results and metadata are stored as `jsonb`. All
//! updates are per-id single statements, so concurrent runs never contend
//! across analyses and completion is atomic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::store::AnalysisStore;
use crate::types::{Analysis, AnalysisResults, AnalysisStatus};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS analyses (
    id                    TEXT PRIMARY KEY,
    document_id           TEXT NOT NULL,
    document_type         TEXT NOT NULL,
    status                TEXT NOT NULL DEFAULT 'pending',
    progress              DOUBLE PRECISION NOT NULL DEFAULT 0.0,
    results               JSONB,
    error                 TEXT,
    created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    processing_time_secs  DOUBLE PRECISION
);
CREATE INDEX IF NOT EXISTS analyses_status_idx ON analyses (status, created_at);
";

pub struct PgAnalysisStore {
    pool: Pool,
}

impl PgAnalysisStore {
    /// Connect to Postgres and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pg_config: tokio_postgres::Config =
            database_url.parse().context("parse DATABASE_URL")?;
        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );
        let pool = Pool::builder(manager)
            .max_size(16)
            .build()
            .context("build postgres pool")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let client = self.pool.get().await.context("postgres connection")?;
        client.batch_execute(SCHEMA_SQL).await.context("apply schema")?;
        Ok(())
    }
}

fn row_to_analysis(row: &Row) -> Result<Analysis> {
    let status_str: String = row.get("status");
    let status = AnalysisStatus::parse(&status_str)
        .with_context(|| format!("unknown analysis status in store: {status_str}"))?;

    let results: Option<serde_json::Value> = row.get("results");
    let results = results
        .map(serde_json::from_value::<AnalysisResults>)
        .transpose()
        .context("decode stored results")?;

    Ok(Analysis {
        id: row.get("id"),
        document_id: row.get("document_id"),
        document_type: row.get("document_type"),
        status,
        progress: row.get("progress"),
        results,
        error: row.get("error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        processing_time_secs: row.get("processing_time_secs"),
    })
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn create(&self, document_id: &str, document_type: &str) -> Result<Analysis> {
        let client = self.pool.get().await.context("postgres connection")?;
        let id = Uuid::new_v4().to_string();
        let row = client
            .query_one(
                "INSERT INTO analyses (id, document_id, document_type)
                 VALUES ($1, $2, $3)
                 RETURNING *",
                &[&id, &document_id, &document_type],
            )
            .await
            .context("insert analysis")?;
        row_to_analysis(&row)
    }

    async fn get(&self, analysis_id: &str) -> Result<Option<Analysis>> {
        let client = self.pool.get().await.context("postgres connection")?;
        let row = client
            .query_opt("SELECT * FROM analyses WHERE id = $1", &[&analysis_id])
            .await
            .context("select analysis")?;
        row.as_ref().map(row_to_analysis).transpose()
    }

    async fn set_status(
        &self,
        analysis_id: &str,
        status: AnalysisStatus,
        error: Option<&str>,
        processing_time_secs: Option<f64>,
    ) -> Result<()> {
        let client = self.pool.get().await.context("postgres connection")?;
        client
            .execute(
                "UPDATE analyses
                 SET status = $2, error = $3, processing_time_secs = $4, updated_at = now()
                 WHERE id = $1",
                &[&analysis_id, &status.as_str(), &error, &processing_time_secs],
            )
            .await
            .context("update analysis status")?;
        Ok(())
    }

    async fn set_progress(&self, analysis_id: &str, progress: f64) -> Result<()> {
        let client = self.pool.get().await.context("postgres connection")?;
        client
            .execute(
                "UPDATE analyses SET progress = $2, updated_at = now() WHERE id = $1",
                &[&analysis_id, &progress],
            )
            .await
            .context("update analysis progress")?;
        Ok(())
    }

    async fn complete(
        &self,
        analysis_id: &str,
        results: &AnalysisResults,
        processing_time_secs: f64,
    ) -> Result<()> {
        let client = self.pool.get().await.context("postgres connection")?;
        let results_json = serde_json::to_value(results).context("encode results")?;
        client
            .execute(
                "UPDATE analyses
                 SET status = 'completed', progress = 1.0, results = $2, error = NULL,
                     processing_time_secs = $3, updated_at = now()
                 WHERE id = $1",
                &[&analysis_id, &results_json, &processing_time_secs],
            )
            .await
            .context("persist analysis results")?;
        Ok(())
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Analysis>> {
        let client = self.pool.get().await.context("postgres connection")?;
        let rows = client
            .query(
                "SELECT * FROM analyses
                 WHERE status = 'pending'
                 ORDER BY created_at ASC
                 LIMIT $1",
                &[&limit],
            )
            .await
            .context("list pending analyses")?;
        rows.iter().map(row_to_analysis).collect()
    }
}
