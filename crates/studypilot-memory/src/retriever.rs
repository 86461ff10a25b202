use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studypilot_schema::MemoryChunk;

use crate::EmbeddingProvider;

/// Nearest-neighbour search over the learner's stored material.
///
/// Results come back in descending score order.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<MemoryChunk>>;
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Qdrant points search behind an embedding model.
pub struct QdrantRetriever {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QdrantRetriever {
    pub fn new(
        base_url: impl Into<String>,
        collection: impl Into<String>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            embedder,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<PointPayload>,
}

#[derive(Deserialize, Default)]
struct PointPayload {
    #[serde(default)]
    text: String,
    #[serde(default)]
    metadata: PointMetadata,
}

#[derive(Deserialize, Default)]
struct PointMetadata {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

impl From<ScoredPoint> for MemoryChunk {
    fn from(point: ScoredPoint) -> Self {
        let payload = point.payload.unwrap_or_default();
        MemoryChunk {
            text: payload.text,
            score: point.score,
            source: payload.metadata.source,
            topic: payload.metadata.topic,
        }
    }
}

#[async_trait]
impl Retriever for QdrantRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<MemoryChunk>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(anyhow!("query cannot be empty"));
        }

        let vector = self
            .embedder
            .embed_query(query)
            .await
            .with_context(|| format!("failed to embed query with {}", self.embedder.model_id()))?;

        let url = format!(
            "{}/collections/{}/points/search",
            self.base_url, self.collection
        );
        let body = SearchRequest {
            vector: &vector,
            limit: top_k,
            with_payload: true,
        };

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("qdrant search request failed")?
            .error_for_status()
            .context("qdrant search returned an error status")?;

        let parsed: SearchResponse = resp.json().await.context("invalid qdrant response")?;
        let chunks: Vec<MemoryChunk> = parsed.result.into_iter().map(MemoryChunk::from).collect();
        tracing::debug!(
            collection = %self.collection,
            hits = chunks.len(),
            "qdrant search complete"
        );
        Ok(chunks)
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/collections/{}", self.base_url, self.collection);
        self.client
            .get(url)
            .timeout(Duration::from_secs(2))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Serves a fixed list of chunks regardless of the query.
#[derive(Default)]
pub struct StaticRetriever {
    chunks: Vec<MemoryChunk>,
}

impl StaticRetriever {
    pub fn new(chunks: Vec<MemoryChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, _query: &str, top_k: usize) -> Result<Vec<MemoryChunk>> {
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}
