use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studypilot_schema::Mode;

/// Which model family serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Long-form reasoning: plan, explain, coach, study plans.
    Reasoning,
    /// Low-temperature output meant to be parsed: quiz, flashcards, review.
    Structured,
}

impl Channel {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Plan | Mode::Explain | Mode::Coach => Self::Reasoning,
            Mode::Quiz | Mode::Flashcards | Mode::Review => Self::Structured,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Structured => "structured",
        }
    }

    /// System prompt for callers that do not assemble their own.
    pub fn default_system_prompt(&self) -> &'static str {
        match self {
            Self::Reasoning => REASONING_SYSTEM_PROMPT,
            Self::Structured => STRUCTURED_SYSTEM_PROMPT,
        }
    }
}

const REASONING_SYSTEM_PROMPT: &str = "You are a highly intelligent study assistant with deep expertise across all academic subjects.
Your role is to provide thorough, accurate, and insightful explanations.
Break down complex topics step-by-step.
Use examples and analogies when helpful.
Always aim for clarity and educational value.";

const STRUCTURED_SYSTEM_PROMPT: &str = "You are a precise and efficient study assistant.
Provide clear, concise, and well-formatted answers.
When asked for structured data (like flashcards), return valid JSON.
Focus on educational clarity and accuracy.";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system: Option<String>,
    pub channel: Channel,
    /// Overrides the channel's configured temperature.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(channel: Channel, prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            channel,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text generation collaborator.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}
