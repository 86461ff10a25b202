use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "all-minilm";
pub const DEFAULT_OLLAMA_EMBED_DIMENSIONS: usize = 384;
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Turns study text into vectors comparable with the stored collection.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedding provider returned no vector"))
    }
}

/// Ollama `/api/embed`, the same server that hosts the chat models.
#[derive(Clone)]
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    model: String,
    dimensions: usize,
    base_url: String,
}

impl OllamaEmbeddingProvider {
    pub fn new() -> Self {
        Self::with_model(
            DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
            DEFAULT_OLLAMA_EMBED_DIMENSIONS,
        )
    }

    pub fn with_model(model: String, dimensions: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            model,
            dimensions,
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// True when Ollama answers and has the configured model pulled.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let tags = match self
            .client
            .get(url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .and_then(|r| r.error_for_status())
        {
            Ok(resp) => resp.json::<TagsResponse>().await.unwrap_or_default(),
            Err(e) => {
                tracing::debug!("ollama tags request failed: {e}");
                return false;
            }
        };
        tags.models.iter().any(|m| self.matches_model(&m.name))
    }

    /// `all-minilm` matches both `all-minilm` and `all-minilm:latest`.
    fn matches_model(&self, name: &str) -> bool {
        match name.split_once(':') {
            Some((base, _)) => base == self.model || name == self.model,
            None => name == self.model,
        }
    }
}

impl Default for OllamaEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize, Default)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let parsed: EmbedResponse = self
            .client
            .post(url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .context("ollama embed request failed")?
            .error_for_status()
            .context("ollama embed returned an error status")?
            .json()
            .await
            .context("invalid ollama embed response")?;

        if parsed.embeddings.len() != texts.len() {
            return Err(anyhow!(
                "ollama returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            ));
        }
        if let Some(first) = parsed.embeddings.first() {
            if first.len() != self.dimensions {
                tracing::warn!(
                    model = %self.model,
                    configured = self.dimensions,
                    actual = first.len(),
                    "embedding dimensions differ from configuration"
                );
            }
        }
        Ok(parsed.embeddings)
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Offline embedder: hashed bag of words, L2-normalised.
///
/// Texts sharing words land near each other, which is enough for wiring
/// checks against a local collection.
#[derive(Clone)]
pub struct StubEmbeddingProvider {
    dims: usize,
}

impl StubEmbeddingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_id(&self) -> &str {
        "stub"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
