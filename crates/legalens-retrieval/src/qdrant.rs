//! Qdrant-backed precedent index.
//!
//! Talks to Qdrant's REST API directly: collection bootstrap, point
//! upsert, retrieval by id and cosine-similarity search. Payload fields
//! map onto [`Precedent`] with empty-string defaults; the hit score
//! becomes the precedent's similarity score.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use legalens_core::types::Precedent;
use legalens_core::vector::VectorIndex;

use crate::embed::{deterministic_vector, Embedder};

/// Default embedding dimensionality of the precedent collection.
pub const DEFAULT_VECTOR_SIZE: usize = 768;

pub struct QdrantIndex {
    base_url: String,
    collection: String,
    vector_size: usize,
    embedder: Arc<dyn Embedder>,
    http: reqwest::Client,
}

impl QdrantIndex {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            vector_size: DEFAULT_VECTOR_SIZE,
            embedder,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_vector_size(mut self, size: usize) -> Self {
        self.vector_size = size;
        self
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    /// Create the collection if it does not exist yet (cosine distance).
    pub async fn ensure_collection(&self) -> Result<()> {
        let existing: Value = self
            .http
            .get(format!("{}/collections", self.base_url))
            .send()
            .await
            .context("list qdrant collections")?
            .error_for_status()?
            .json()
            .await?;

        let already_there = existing["result"]["collections"]
            .as_array()
            .map(|cols| {
                cols.iter()
                    .any(|c| c["name"].as_str() == Some(self.collection.as_str()))
            })
            .unwrap_or(false);
        if already_there {
            return Ok(());
        }

        info!(collection = %self.collection, "creating qdrant collection");
        self.http
            .put(self.collection_url())
            .json(&serde_json::json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await
            .context("create qdrant collection")?
            .error_for_status()?;
        Ok(())
    }

    /// Embed text, degrading to a deterministic hash-seeded vector when the
    /// embedder is unavailable.
    async fn vectorize(&self, text: &str) -> Vec<f32> {
        match self.embedder.embed(text).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("embedding failed, using deterministic fallback vector: {e:#}");
                deterministic_vector(text, self.vector_size)
            }
        }
    }

    /// Insert one precedent into the index, returning its id.
    pub async fn add_precedent(
        &self,
        title: &str,
        description: &str,
        kind: &str,
        relevance: &str,
        source: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let mut payload = serde_json::json!({
            "title": title,
            "description": description,
            "type": kind,
            "relevance": relevance,
            "created_at": Utc::now().to_rfc3339(),
        });
        if let Some(source) = source {
            payload["source"] = Value::String(source.to_string());
        }

        let vector = self.vectorize(description).await;

        self.http
            .put(format!("{}/points", self.collection_url()))
            .json(&serde_json::json!({
                "points": [{ "id": id, "vector": vector, "payload": payload }]
            }))
            .send()
            .await
            .context("upsert qdrant point")?
            .error_for_status()?;

        Ok(id)
    }

    /// Fetch a precedent by id. Direct retrieval carries a score of 1.0.
    pub async fn get_precedent(&self, precedent_id: &str) -> Result<Option<Precedent>> {
        let response: Value = self
            .http
            .post(format!("{}/points", self.collection_url()))
            .json(&serde_json::json!({ "ids": [precedent_id] }))
            .send()
            .await
            .context("retrieve qdrant point")?
            .error_for_status()?
            .json()
            .await?;

        let Some(point) = response["result"].as_array().and_then(|points| points.first()) else {
            return Ok(None);
        };
        Ok(Some(payload_to_precedent(&point["payload"], 1.0)))
    }

    /// Load precedents from a JSON file and insert them all, returning the
    /// number inserted.
    pub async fn seed_from_file(&self, path: &str) -> Result<usize> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read precedents file {path}"))?;
        let records: Vec<Value> =
            serde_json::from_str(&contents).context("parse precedents file")?;

        let mut count = 0;
        for record in &records {
            let title = record["title"]
                .as_str()
                .ok_or_else(|| anyhow!("precedent record missing title"))?;
            let description = record["description"]
                .as_str()
                .ok_or_else(|| anyhow!("precedent record missing description"))?;
            let kind = record["type"]
                .as_str()
                .ok_or_else(|| anyhow!("precedent record missing type"))?;
            let relevance = record["relevance"]
                .as_str()
                .ok_or_else(|| anyhow!("precedent record missing relevance"))?;
            self.add_precedent(title, description, kind, relevance, record["source"].as_str())
                .await?;
            count += 1;
        }

        info!(count, "seeded precedent index");
        Ok(count)
    }
}

/// Map a Qdrant payload onto a [`Precedent`] with the given score.
/// Missing payload fields default to empty strings.
pub fn payload_to_precedent(payload: &Value, score: f64) -> Precedent {
    Precedent {
        title: payload["title"].as_str().unwrap_or_default().to_string(),
        description: payload["description"].as_str().unwrap_or_default().to_string(),
        kind: payload["type"].as_str().unwrap_or_default().to_string(),
        relevance: payload["relevance"].as_str().unwrap_or_default().to_string(),
        source: payload["source"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        similarity_score: score,
    }
}

/// Convert a Qdrant search response body into precedents.
pub fn search_response_to_precedents(response: &Value) -> Vec<Precedent> {
    response["result"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| {
                    payload_to_precedent(&hit["payload"], hit["score"].as_f64().unwrap_or(0.0))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search_similar(&self, query: &str, limit: usize) -> Result<Vec<Precedent>> {
        let vector = self.vectorize(query).await;

        let response: Value = self
            .http
            .post(format!("{}/points/search", self.collection_url()))
            .json(&serde_json::json!({
                "vector": vector,
                "limit": limit,
                "with_payload": true,
            }))
            .send()
            .await
            .context("qdrant similarity search")?
            .error_for_status()?
            .json()
            .await
            .context("decode qdrant search response")?;

        let precedents = search_response_to_precedents(&response);
        info!(count = precedents.len(), limit, "qdrant search returned hits");
        Ok(precedents)
    }
}
