pub mod openai;
pub mod openai_compat;
pub mod types;

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::{ChatApiError, OpenAiProvider};
pub use openai_compat::{ollama, ollama_with_base};
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Client implementation behind a configured provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI-compatible chat completions (Ollama `/v1` included).
    #[default]
    OpenaiCompat,
    /// Offline echo client; needs no endpoint.
    Stub,
}

/// One configured provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider_id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            kind: ProviderKind::OpenaiCompat,
            enabled: true,
            api_base: api_base.into(),
            api_key: None,
        }
    }

    pub fn stub(provider_id: impl Into<String>) -> Self {
        Self {
            kind: ProviderKind::Stub,
            ..Self::new(provider_id, "")
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Local endpoints (no key) get the Ollama client, keyed ones the hosted client.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    if config.kind == ProviderKind::Stub {
        return Ok(Arc::new(StubProvider));
    }
    let base = config.api_base.trim();
    if base.is_empty() {
        return Err(anyhow!("provider {} requires api_base", config.provider_id));
    }
    let client = match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => OpenAiProvider::new(key, base),
        None => ollama_with_base(base),
    };
    Ok(Arc::new(client))
}

/// Provider clients by id, looked up from `provider/model` strings.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every enabled provider. Duplicate ids are rejected.
    pub fn from_configs(configs: &[ProviderConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs.iter().filter(|c| c.enabled) {
            if registry.providers.contains_key(&config.provider_id) {
                return Err(anyhow!("duplicate provider id: {}", config.provider_id));
            }
            registry.register(&config.provider_id, create_provider(config)?);
            tracing::info!(provider = %config.provider_id, base = %config.api_base, "provider registered");
        }
        Ok(registry)
    }

    pub fn register(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn LlmProvider>> {
        self.providers
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("provider not found: {id}"))
    }

    /// Ids in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Echoes the last user message. Selected with `kind: stub` for offline runs.
pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        Ok(LlmResponse {
            text: format!(
                "[stub:{}] {}",
                request.model,
                request.last_user_text().unwrap_or_default()
            ),
            input_tokens: None,
            output_tokens: None,
            stop_reason: Some("end_turn".into()),
        })
    }
}
