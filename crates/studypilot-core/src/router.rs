use std::collections::{HashMap, HashSet};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use studypilot_provider::{LlmMessage, LlmRequest, LlmResponse, ProviderRegistry};
use tokio::time;

use crate::generation::{Channel, GenerationRequest, Generator};

const MAX_RETRIES: usize = 2;
const BASE_BACKOFF_MS: u64 = 1000;

/// Model selection and sampling defaults for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRoute {
    /// `provider/model`
    pub model: String,
    pub fallbacks: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChannelRoute {
    pub fn new(model: impl Into<String>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            fallbacks: Vec::new(),
            temperature,
            max_tokens,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallbacks = fallbacks;
        self
    }
}

/// Sends chat requests to the configured provider chain.
///
/// Errors tagged `[retryable]` are retried on the same provider with
/// exponential backoff before moving on to the next candidate.
pub struct LlmRouter {
    registry: ProviderRegistry,
    routes: HashMap<Channel, ChannelRoute>,
}

impl LlmRouter {
    pub fn new(registry: ProviderRegistry, routes: HashMap<Channel, ChannelRoute>) -> Self {
        Self { registry, routes }
    }

    pub fn route(&self, channel: Channel) -> Option<&ChannelRoute> {
        self.routes.get(&channel)
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub async fn chat(
        &self,
        primary: &str,
        fallbacks: &[String],
        system: Option<String>,
        messages: Vec<LlmMessage>,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let mut candidates = vec![primary.to_string()];
        candidates.extend(fallbacks.iter().cloned());

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));

        let mut last_err: Option<anyhow::Error> = None;
        let mut tried: Vec<String> = Vec::new();

        for (idx, candidate) in candidates.iter().enumerate() {
            let (provider_id, model_id) = match parse_provider_model(candidate) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("invalid model format {candidate}: {e}");
                    continue;
                }
            };

            let provider = match self.registry.get(&provider_id) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!("provider {provider_id} not available: {e}");
                    continue;
                }
            };

            tried.push(candidate.clone());

            let mut attempts = 0;
            loop {
                let req = LlmRequest {
                    model: model_id.clone(),
                    system: system.clone(),
                    messages: messages.clone(),
                    max_tokens,
                    temperature,
                };

                match provider.chat(req).await {
                    Ok(resp) => {
                        if idx > 0 {
                            tracing::info!(
                                "fallback_triggered=true, from={}, to={}, attempt={}",
                                primary,
                                candidate,
                                idx + 1
                            );
                        }
                        return Ok(resp);
                    }
                    Err(err) => {
                        let err_str = err.to_string();
                        let is_retryable = err_str.contains("[retryable]");

                        if is_retryable && attempts < MAX_RETRIES {
                            attempts += 1;
                            let backoff = BASE_BACKOFF_MS * (1 << (attempts - 1));
                            tracing::warn!(
                                "provider {provider_id} retryable error (attempt {attempts}/{MAX_RETRIES}), backing off {backoff}ms: {err_str}"
                            );
                            time::sleep(time::Duration::from_millis(backoff)).await;
                            continue;
                        }

                        tracing::warn!(
                            "provider {provider_id} failed (retryable={is_retryable}, attempts={attempts}): {err_str}"
                        );
                        last_err = Some(err);
                        break;
                    }
                }
            }
        }

        let tried = tried.join(" -> ");
        Err(last_err.unwrap_or_else(|| anyhow!("all model candidates failed (tried: {tried})")))
    }
}

#[async_trait]
impl Generator for LlmRouter {
    async fn generate(&self, request: GenerationRequest) -> Result<String> {
        let route = self
            .routes
            .get(&request.channel)
            .ok_or_else(|| anyhow!("no model configured for {} channel", request.channel.as_str()))?;

        let resp = self
            .chat(
                &route.model,
                &route.fallbacks,
                request.system,
                vec![LlmMessage::user(request.prompt)],
                route.max_tokens,
                Some(request.temperature.unwrap_or(route.temperature)),
            )
            .await?;
        if resp.truncated() {
            tracing::warn!(
                channel = request.channel.as_str(),
                max_tokens = route.max_tokens,
                "generation stopped at the token limit"
            );
        }
        Ok(resp.text)
    }
}

pub fn parse_provider_model(input: &str) -> Result<(String, String)> {
    let (provider, model) = input
        .split_once('/')
        .ok_or_else(|| anyhow!("invalid model format: {input}"))?;
    if provider.is_empty() || model.is_empty() {
        return Err(anyhow!("invalid model format: {input}"));
    }
    Ok((provider.to_string(), model.to_string()))
}
