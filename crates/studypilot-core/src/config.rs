use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use studypilot_provider::ProviderConfig;

use crate::generation::Channel;
use crate::relevance::{RelevanceGate, DEFAULT_MAX_CONTEXT_CHUNKS, DEFAULT_RELEVANCE_THRESHOLD};
use crate::router::{parse_provider_model, ChannelRoute};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub env: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// `provider/model`
    pub model: String,
    #[serde(default)]
    pub fallbacks: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChannelConfig {
    pub fn to_route(&self) -> ChannelRoute {
        ChannelRoute::new(&self.model, self.temperature, self.max_tokens)
            .with_fallbacks(self.fallbacks.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub reasoning: ChannelConfig,
    pub structured: ChannelConfig,
}

impl GenerationConfig {
    pub fn routes(&self) -> HashMap<Channel, ChannelRoute> {
        HashMap::from([
            (Channel::Reasoning, self.reasoning.to_route()),
            (Channel::Structured, self.structured.to_route()),
        ])
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `ollama` or `stub`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            base_url: default_embedding_base_url(),
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "studypal".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_threshold() -> f32 {
    DEFAULT_RELEVANCE_THRESHOLD
}

fn default_max_context_chunks() -> usize {
    DEFAULT_MAX_CONTEXT_CHUNKS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qdrant_url: default_qdrant_url(),
            collection: default_collection(),
            top_k: default_top_k(),
            relevance_threshold: default_threshold(),
            max_context_chunks: default_max_context_chunks(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl MemoryConfig {
    pub fn gate(&self) -> RelevanceGate {
        RelevanceGate::new(self.relevance_threshold, self.max_context_chunks)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPilotConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Reads `<root>/config/main.yaml`, resolves `${VAR}` placeholders and validates.
pub fn load_config(root: &Path) -> Result<StudyPilotConfig> {
    let path = root.join("config").join("main.yaml");
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let mut config: StudyPilotConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))?;

    resolve_config_env(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &StudyPilotConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for provider in &config.providers {
        if !seen.insert(provider.provider_id.as_str()) {
            return Err(anyhow!("duplicate provider_id: {}", provider.provider_id));
        }
    }

    let enabled: HashSet<&str> = config
        .providers
        .iter()
        .filter(|p| p.enabled)
        .map(|p| p.provider_id.as_str())
        .collect();

    for (name, channel) in [
        ("reasoning", &config.generation.reasoning),
        ("structured", &config.generation.structured),
    ] {
        let (provider_id, _) = parse_provider_model(&channel.model)
            .with_context(|| format!("generation.{name}.model"))?;
        if !enabled.contains(provider_id.as_str()) {
            return Err(anyhow!(
                "generation.{name} references unknown or disabled provider: {provider_id}"
            ));
        }
        for fallback in &channel.fallbacks {
            parse_provider_model(fallback)
                .with_context(|| format!("generation.{name}.fallbacks"))?;
        }
    }

    let memory = &config.memory;
    if memory.top_k == 0 {
        return Err(anyhow!("memory.top_k must be at least 1"));
    }
    if memory.max_context_chunks == 0 {
        return Err(anyhow!("memory.max_context_chunks must be at least 1"));
    }
    if !memory.relevance_threshold.is_finite() {
        return Err(anyhow!("memory.relevance_threshold must be a finite number"));
    }
    if !matches!(memory.embedding.provider.as_str(), "ollama" | "stub") {
        return Err(anyhow!(
            "unknown embedding provider: {}",
            memory.embedding.provider
        ));
    }

    Ok(())
}

fn resolve_config_env(config: &mut StudyPilotConfig) {
    config.app.name = resolve_env_var(&config.app.name);
    config.app.env = resolve_env_var(&config.app.env);
    config.server.bind = resolve_env_var(&config.server.bind);

    for provider in &mut config.providers {
        provider.provider_id = resolve_env_var(&provider.provider_id);
        provider.api_base = resolve_env_var(&provider.api_base);
        if let Some(key) = &mut provider.api_key {
            *key = resolve_env_var(key);
        }
    }

    for channel in [
        &mut config.generation.reasoning,
        &mut config.generation.structured,
    ] {
        channel.model = resolve_env_var(&channel.model);
        for fallback in &mut channel.fallbacks {
            *fallback = resolve_env_var(fallback);
        }
    }

    let memory = &mut config.memory;
    memory.qdrant_url = resolve_env_var(&memory.qdrant_url);
    memory.collection = resolve_env_var(&memory.collection);
    memory.embedding.provider = resolve_env_var(&memory.embedding.provider);
    memory.embedding.model = resolve_env_var(&memory.embedding.model);
    memory.embedding.base_url = resolve_env_var(&memory.embedding.base_url);
}
