use std::sync::Arc;

use studypilot_memory::Retriever;
use studypilot_schema::{
    AskRequest, AskResponse, MemoryChunk, MemoryQuality, StudyPlanRequest, StudyPlanResponse,
    StudyState,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{StudyError, StudyResult};
use crate::extract::extract_json;
use crate::generation::{Channel, GenerationRequest, Generator};
use crate::intervention::check_intervention;
use crate::mode::resolve_mode;
use crate::prompt::PromptAssembler;
use crate::relevance::{GatedMemory, RelevanceGate};
use crate::suggestions::rank_suggestions;

const DEFAULT_TOP_K: usize = 5;
const PLAN_TOP_K: usize = 5;
const PLAN_MATERIALS: usize = 3;
const PLAN_MATERIAL_PREVIEW_CHARS: usize = 150;
pub const MAX_PLAN_DAYS: u32 = 365;

/// Runs one ask cycle: mode, intervention, retrieval, prompt, generation,
/// extraction and suggestions.
pub struct Orchestrator {
    generator: Arc<dyn Generator>,
    retriever: Option<Arc<dyn Retriever>>,
    assembler: PromptAssembler,
    clock: Arc<dyn Clock>,
    top_k: usize,
}

impl Orchestrator {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            retriever: None,
            assembler: PromptAssembler::default(),
            clock: Arc::new(SystemClock),
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_gate(mut self, gate: RelevanceGate) -> Self {
        self.assembler = PromptAssembler::new(gate);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn has_retriever(&self) -> bool {
        self.retriever.is_some()
    }

    pub async fn ask(&self, request: AskRequest) -> StudyResult<AskResponse> {
        let request_id = Uuid::new_v4();
        self.ask_inner(request)
            .instrument(tracing::info_span!("ask", %request_id))
            .await
    }

    async fn ask_inner(&self, request: AskRequest) -> StudyResult<AskResponse> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(StudyError::invalid("Message cannot be empty"));
        }

        let state = request.context.as_ref();
        let fallback_state = StudyState::default();
        let effective_state = state.unwrap_or(&fallback_state);
        let hour = self.clock.hour();

        let mode = request.mode.unwrap_or_else(|| resolve_mode(message, state));
        tracing::info!(mode = %mode, forced = request.mode.is_some(), "mode resolved");

        let suggestions = rank_suggestions(effective_state, hour);

        if !request.skip_intervention {
            if let Some(intervention) = check_intervention(mode, effective_state, hour) {
                tracing::info!(
                    priority = ?intervention.priority,
                    redirect = %intervention.suggested_mode,
                    "intervention triggered"
                );
                return Ok(AskResponse {
                    mode: intervention.suggested_mode,
                    answer: intervention.message.clone(),
                    structured_output: None,
                    intervention: Some(intervention),
                    memory_used: false,
                    memory_quality: MemoryQuality::None,
                    chunks_used: 0,
                    suggestions,
                });
            }
        }

        let memory = if request.use_memory {
            let chunks = self.retrieve(message, self.top_k).await;
            self.assembler.gate().filter(chunks)
        } else {
            GatedMemory::empty()
        };
        tracing::info!(
            quality = memory.quality.as_str(),
            retrieved = memory.retrieved,
            strong = memory.strong.len(),
            "memory gated"
        );

        let system = self.assembler.build_gated(mode, state, &memory);
        tracing::debug!(system_chars = system.len(), "system prompt assembled");

        let channel = Channel::for_mode(mode);
        let answer = self
            .generator
            .generate(GenerationRequest::new(channel, message).with_system(system))
            .await
            .map_err(StudyError::Generation)?;

        let structured_output = if mode.expects_structured_output() {
            let parsed = extract_json(&answer);
            if parsed.is_none() {
                tracing::warn!(mode = %mode, "no structured output in generated answer");
            }
            parsed
        } else {
            None
        };

        Ok(AskResponse {
            mode,
            answer,
            structured_output,
            intervention: None,
            memory_used: memory.was_used(),
            memory_quality: memory.quality,
            chunks_used: memory.strong.len(),
            suggestions,
        })
    }

    pub async fn create_study_plan(
        &self,
        request: &StudyPlanRequest,
    ) -> StudyResult<StudyPlanResponse> {
        let subject = request.subject.trim();
        if subject.is_empty() {
            return Err(StudyError::invalid("Subject cannot be empty"));
        }
        if !(1..=MAX_PLAN_DAYS).contains(&request.days) {
            return Err(StudyError::invalid(format!(
                "days must be between 1 and {MAX_PLAN_DAYS}"
            )));
        }

        let mut knowledge = request
            .current_knowledge
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let mut materials_used = 0;

        if request.retrieve_materials {
            let gated = self
                .assembler
                .gate()
                .filter(self.retrieve(subject, PLAN_TOP_K).await);
            materials_used = gated.strong.len();
            if materials_used > 0 {
                let listed: Vec<String> = gated
                    .strong
                    .iter()
                    .take(PLAN_MATERIALS)
                    .map(|c| {
                        let preview: String =
                            c.text.chars().take(PLAN_MATERIAL_PREVIEW_CHARS).collect();
                        format!("- {preview}")
                    })
                    .collect();
                if !knowledge.is_empty() {
                    knowledge.push_str("\n\n");
                }
                knowledge.push_str("Available study materials:\n");
                knowledge.push_str(&listed.join("\n"));
                tracing::info!(subject, materials_used, "study materials attached to plan");
            }
        }

        let prompt = study_plan_prompt(subject, request.days, &knowledge);
        let plan = self
            .generator
            .generate(
                GenerationRequest::new(Channel::Reasoning, prompt)
                    .with_system(Channel::Reasoning.default_system_prompt()),
            )
            .await
            .map_err(StudyError::Generation)?;

        Ok(StudyPlanResponse {
            plan,
            subject: subject.to_string(),
            days: request.days,
            materials_used,
        })
    }

    async fn retrieve(&self, query: &str, top_k: usize) -> Vec<MemoryChunk> {
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };
        match retriever.search(query, top_k).await {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!("memory retrieval failed: {e:#}");
                Vec::new()
            }
        }
    }
}

fn study_plan_prompt(subject: &str, days: u32, knowledge: &str) -> String {
    let knowledge_line = if knowledge.is_empty() {
        String::new()
    } else {
        format!("Current knowledge level: {knowledge}")
    };
    format!(
        "Create a detailed {days}-day study plan for: {subject}

{knowledge_line}

Provide a day-by-day breakdown with:
- Daily topics to cover
- Recommended study duration
- Key concepts to master
- Practice exercises or review activities

Make it realistic and effective for mastery."
    )
}
