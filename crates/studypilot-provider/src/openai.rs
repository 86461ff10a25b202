use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{LlmProvider, LlmRequest, LlmResponse};

const REQUEST_TIMEOUT_SECS: u64 = 120;
const HEALTH_TIMEOUT_SECS: u64 = 5;

/// Failures from a chat-completions endpoint.
///
/// Transient failures carry the `[retryable]` tag in their message; the
/// router keys its retry loop on it.
#[derive(Debug, thiserror::Error)]
pub enum ChatApiError {
    #[error("chat api timed out after {0}s [retryable]")]
    Timeout(u64),
    #[error("chat api unreachable [retryable]: {0}")]
    Connect(String),
    #[error("chat api error ({status}){}: {message}", retry_tag(.status))]
    Status { status: StatusCode, message: String },
    #[error("chat api returned no choices")]
    EmptyChoices,
}

impl ChatApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status, .. } => status_is_transient(*status),
            Self::EmptyChoices => false,
        }
    }
}

fn status_is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

fn retry_tag(status: &StatusCode) -> &'static str {
    if status_is_transient(*status) {
        " [retryable]"
    } else {
        ""
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    async fn post_completion(
        &self,
        body: &CompletionBody<'_>,
    ) -> Result<CompletionReply, ChatApiError> {
        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChatApiError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    ChatApiError::Connect(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            return Err(ChatApiError::Status {
                status,
                message: error_message(&raw),
            });
        }

        resp.json::<CompletionReply>()
            .await
            .map_err(|e| ChatApiError::Status {
                status,
                message: format!("undecodable completion body: {e}"),
            })
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let body = CompletionBody::from_request(&request);
        tracing::debug!(
            model = %request.model,
            messages = body.messages.len(),
            "sending chat completion"
        );
        let reply = self.post_completion(&body).await?;
        Ok(reply.into_response()?)
    }

    async fn health(&self) -> Result<()> {
        let resp = self
            .client
            .get(format!("{}/models", self.api_base))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await?;
        if !resp.status().is_success() {
            anyhow::bail!("model listing returned {}", resp.status());
        }
        Ok(())
    }
}

/// Pull the human-readable part out of an error body, falling back to the raw text.
fn error_message(raw: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(raw) {
        Ok(envelope) => match envelope.error.kind {
            Some(kind) => format!("{} ({kind})", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) if raw.trim().is_empty() => "no error body".to_string(),
        Err(_) => raw.chars().take(200).collect(),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> CompletionBody<'a> {
    /// The system prompt travels as the leading `system` message.
    pub(crate) fn from_request(request: &'a LlmRequest) -> Self {
        let system = request.system.as_deref().map(|content| WireMessage {
            role: "system",
            content,
        });
        let turns = request.messages.iter().map(|m| WireMessage {
            role: m.role.as_str(),
            content: &m.content,
        });
        Self {
            model: &request.model,
            messages: system.into_iter().chain(turns).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionReply {
    choices: Vec<ReplyChoice>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Debug, Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

impl CompletionReply {
    fn into_response(self) -> Result<LlmResponse, ChatApiError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(ChatApiError::EmptyChoices)?;
        let stop_reason = match choice.finish_reason.as_deref() {
            Some("stop") => Some("end_turn".to_string()),
            Some("length") => Some("max_tokens".to_string()),
            _ => choice.finish_reason,
        };
        Ok(LlmResponse {
            text: choice.message.content.unwrap_or_default(),
            input_tokens: self.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: self.usage.as_ref().map(|u| u.completion_tokens),
            stop_reason,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}
