use std::sync::Arc;

use studypilot_core::{FlashcardEngine, Orchestrator};
use studypilot_memory::Retriever;
use studypilot_provider::LlmProvider;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub flashcards: Arc<FlashcardEngine>,
    pub probes: HealthProbes,
}

/// Collaborators pinged by `/api/ai/health`. `None` means not configured.
#[derive(Clone, Default)]
pub struct HealthProbes {
    pub generation: Option<Arc<dyn LlmProvider>>,
    pub memory: Option<Arc<dyn Retriever>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, flashcards: FlashcardEngine) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            flashcards: Arc::new(flashcards),
            probes: HealthProbes::default(),
        }
    }

    pub fn with_probes(mut self, probes: HealthProbes) -> Self {
        self.probes = probes;
        self
    }
}
