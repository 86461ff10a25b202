//! Local OpenAI-compatible endpoints.

use crate::OpenAiProvider;

pub const OLLAMA_DEFAULT_BASE: &str = "http://localhost:11434/v1";

/// Ollama exposes an OpenAI-compatible API under `/v1`.
pub fn ollama() -> OpenAiProvider {
    ollama_with_base(OLLAMA_DEFAULT_BASE)
}

pub fn ollama_with_base(base_url: impl Into<String>) -> OpenAiProvider {
    // Ollama ignores the key but the header must be present.
    OpenAiProvider::new("ollama", base_url)
}
