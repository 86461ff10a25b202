use std::sync::Arc;

use anyhow::Result;
use studypilot_core::{
    parse_provider_model, FlashcardEngine, LlmRouter, MemoryConfig, Orchestrator,
    StudyPilotConfig,
};
use studypilot_memory::{
    EmbeddingProvider, OllamaEmbeddingProvider, QdrantRetriever, Retriever, StubEmbeddingProvider,
};
use studypilot_provider::ProviderRegistry;
use studypilot_server::state::{AppState, HealthProbes};

/// Wires collaborators from configuration into the HTTP/CLI state.
pub async fn bootstrap(config: &StudyPilotConfig) -> Result<AppState> {
    let router = build_router_from_config(config)?;
    let generation_probe = parse_provider_model(&config.generation.reasoning.model)
        .ok()
        .and_then(|(provider_id, _)| router.registry().get(&provider_id).ok());
    let router = Arc::new(router);

    let retriever = build_retriever(&config.memory).await;
    let gate = config.memory.gate();

    let mut orchestrator = Orchestrator::new(router.clone())
        .with_gate(gate)
        .with_top_k(config.memory.top_k);
    let mut flashcards = FlashcardEngine::new(router).with_gate(gate);
    if let Some(retriever) = &retriever {
        orchestrator = orchestrator.with_retriever(retriever.clone());
        flashcards = flashcards.with_retriever(retriever.clone());
    }

    Ok(AppState::new(orchestrator, flashcards).with_probes(HealthProbes {
        generation: generation_probe,
        memory: retriever,
    }))
}

pub fn build_router_from_config(config: &StudyPilotConfig) -> Result<LlmRouter> {
    let registry = ProviderRegistry::from_configs(&config.providers)?;
    Ok(LlmRouter::new(registry, config.generation.routes()))
}

async fn build_retriever(config: &MemoryConfig) -> Option<Arc<dyn Retriever>> {
    if !config.enabled {
        tracing::info!("Memory disabled, answering without retrieval");
        return None;
    }

    let embedding = build_embedding_provider(config).await;
    tracing::info!(
        "Qdrant retriever configured ({}, collection: {})",
        config.qdrant_url,
        config.collection
    );
    Some(Arc::new(QdrantRetriever::new(
        config.qdrant_url.clone(),
        config.collection.clone(),
        embedding,
    )))
}

async fn build_embedding_provider(config: &MemoryConfig) -> Arc<dyn EmbeddingProvider> {
    let embedding = &config.embedding;
    if embedding.provider == "ollama" {
        let provider =
            OllamaEmbeddingProvider::with_model(embedding.model.clone(), embedding.dimensions)
                .with_base_url(embedding.base_url.clone());
        if provider.is_available().await {
            tracing::info!(
                "Ollama embedding provider initialized (model: {}, dimensions: {})",
                embedding.model,
                embedding.dimensions
            );
            return Arc::new(provider);
        }
        tracing::warn!("Ollama embedding model not available, falling back to stub embeddings");
    }
    Arc::new(StubEmbeddingProvider::new(embedding.dimensions))
}
