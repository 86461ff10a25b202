use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use studypilot_core::*;
use studypilot_memory::{Retriever, StaticRetriever};
use studypilot_provider::{LlmProvider, LlmRequest, LlmResponse, ProviderRegistry};
use studypilot_schema::{
    AskRequest, ExamFlashcardRequest, MemoryChunk, MemoryQuality, Mode, StudyPlanRequest,
    StudyState,
};

fn response(text: String) -> LlmResponse {
    LlmResponse {
        text,
        input_tokens: None,
        output_tokens: None,
        stop_reason: Some("stop".into()),
    }
}

/// Replies with the system prompt and user message it received.
#[derive(Default)]
struct TranscriptProvider {
    seen: Mutex<Vec<LlmRequest>>,
}

#[async_trait]
impl LlmProvider for TranscriptProvider {
    async fn chat(&self, request: LlmRequest) -> anyhow::Result<LlmResponse> {
        let system = request.system.clone().unwrap_or_default();
        let user = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(request);
        Ok(response(format!("[system] {system}\n\n[user] {user}")))
    }
}

struct CannedProvider {
    text: String,
    calls: AtomicUsize,
}

impl CannedProvider {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmProvider for CannedProvider {
    async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(response(self.text.clone()))
    }
}

struct FailProvider;

#[async_trait]
impl LlmProvider for FailProvider {
    async fn chat(&self, _request: LlmRequest) -> anyhow::Result<LlmResponse> {
        Err(anyhow!("openai api error (401): bad key"))
    }
}

struct BrokenRetriever;

#[async_trait]
impl Retriever for BrokenRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> anyhow::Result<Vec<MemoryChunk>> {
        Err(anyhow!("qdrant search request failed"))
    }
}

#[derive(Default)]
struct CountingRetriever {
    calls: AtomicUsize,
}

#[async_trait]
impl Retriever for CountingRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> anyhow::Result<Vec<MemoryChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![MemoryChunk::new("notes", 0.9)])
    }
}

/// One provider serving both channels under distinct model names.
fn router(provider: Arc<dyn LlmProvider>) -> Arc<LlmRouter> {
    let mut registry = ProviderRegistry::new();
    registry.register("ollama", provider);
    Arc::new(LlmRouter::new(
        registry,
        HashMap::from([
            (Channel::Reasoning, ChannelRoute::new("ollama/mixtral", 0.7, 2000)),
            (Channel::Structured, ChannelRoute::new("ollama/qwen2.5:14b", 0.3, 1500)),
        ]),
    ))
}

fn orchestrator(provider: Arc<dyn LlmProvider>) -> Orchestrator {
    Orchestrator::new(router(provider)).with_clock(Arc::new(FixedClock(10)))
}

fn strong_notes() -> Arc<StaticRetriever> {
    Arc::new(StaticRetriever::new(vec![
        MemoryChunk::new("Mitochondria produce ATP through respiration.", 0.88),
        MemoryChunk::new("The Krebs cycle runs in the matrix.", 0.64),
        MemoryChunk::new("Shopping list: eggs.", 0.21),
    ]))
}

#[tokio::test]
async fn explain_with_strong_memory_uses_reasoning_channel() {
    let provider = Arc::new(TranscriptProvider::default());
    let orch = orchestrator(provider.clone()).with_retriever(strong_notes());

    let resp = orch
        .ask(AskRequest::new("Explain how mitochondria make energy"))
        .await
        .unwrap();

    assert_eq!(resp.mode, Mode::Explain);
    assert!(resp.memory_used);
    assert_eq!(resp.memory_quality, MemoryQuality::Strong);
    assert_eq!(resp.chunks_used, 2);
    assert!(resp.structured_output.is_none());
    assert!(resp.answer.contains("MEMORY CONTEXT (from user's study materials):"));
    assert!(resp.answer.contains("[1] (relevance: 88%) Mitochondria produce ATP"));
    assert!(!resp.answer.contains("Shopping list"));
    assert!(resp.answer.ends_with("[user] Explain how mitochondria make energy"));

    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen[0].model, "mixtral");
    assert_eq!(seen[0].temperature, Some(0.7));
}

#[tokio::test]
async fn quiz_structured_output_is_extracted() {
    let provider = CannedProvider::new(
        "Here you go:\n```json\n{\"questions\": [{\"q\": \"What is ATP?\", \"answer\": \"Energy currency\"}]}\n```",
    );
    let resp = orchestrator(provider.clone())
        .ask(AskRequest::new("Quiz me on cell biology"))
        .await
        .unwrap();

    assert_eq!(resp.mode, Mode::Quiz);
    let structured = resp.structured_output.unwrap();
    assert_eq!(structured["questions"][0]["q"], "What is ATP?");
    assert!(resp.answer.starts_with("Here you go:"));
}

#[tokio::test]
async fn unparseable_structured_answer_degrades_to_text() {
    let provider = CannedProvider::new("I'd rather chat about cells.");
    let resp = orchestrator(provider)
        .ask(AskRequest::new("make flashcards for osmosis"))
        .await
        .unwrap();

    assert_eq!(resp.mode, Mode::Flashcards);
    assert!(resp.structured_output.is_none());
    assert_eq!(resp.answer, "I'd rather chat about cells.");
}

#[tokio::test]
async fn intervention_short_circuits_generation_and_retrieval() {
    let provider = CannedProvider::new("should not be used");
    let retriever = Arc::new(CountingRetriever::default());
    let orch = orchestrator(provider.clone()).with_retriever(retriever.clone());

    let mut request = AskRequest::new("explain photosynthesis");
    request.context = Some(StudyState {
        focus_minutes_today: 0,
        urgent_task_count: 2,
        overdue_tasks: 3,
        ..StudyState::default()
    });
    let resp = orch.ask(request).await.unwrap();

    assert_eq!(resp.mode, Mode::Coach);
    assert!(resp.answer.contains("2 urgent tasks"));
    assert!(resp.intervention.is_some());
    assert!(!resp.memory_used);
    assert_eq!(resp.memory_quality, MemoryQuality::None);
    assert_eq!(resp.chunks_used, 0);
    assert!(!resp.suggestions.is_empty());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn skip_intervention_proceeds_normally() {
    let provider = CannedProvider::new("Photosynthesis converts light into chemical energy.");
    let mut request = AskRequest::new("explain photosynthesis");
    request.skip_intervention = true;
    request.context = Some(StudyState {
        urgent_task_count: 2,
        ..StudyState::default()
    });

    let resp = orchestrator(provider.clone()).ask(request).await.unwrap();
    assert_eq!(resp.mode, Mode::Explain);
    assert!(resp.intervention.is_none());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn suggestions_are_capped_and_ordered() {
    let provider = CannedProvider::new("ok");
    let mut request = AskRequest::new("explain enzymes");
    request.skip_intervention = true;
    request.context = Some(StudyState {
        urgent_task_count: 1,
        flashcards_due: 30,
        overdue_tasks: 2,
        streak_days: 5,
        ..StudyState::default()
    });

    let resp = Orchestrator::new(router(provider))
        .with_clock(Arc::new(FixedClock(21)))
        .ask(request)
        .await
        .unwrap();

    let ids: Vec<&str> = resp.suggestions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["no-focus", "flashcards-due", "overdue-tasks"]);
}

#[tokio::test]
async fn weak_memory_is_flagged_not_injected() {
    let provider = Arc::new(TranscriptProvider::default());
    let retriever = Arc::new(StaticRetriever::new(vec![MemoryChunk::new("faint echo", 0.3)]));
    let resp = orchestrator(provider)
        .with_retriever(retriever)
        .ask(AskRequest::new("explain entropy"))
        .await
        .unwrap();

    assert_eq!(resp.memory_quality, MemoryQuality::Weak);
    assert!(resp.memory_used);
    assert_eq!(resp.chunks_used, 0);
    assert!(resp.answer.contains("I don't have strong material on this. Want to add notes?"));
    assert!(!resp.answer.contains("faint echo"));
}

#[tokio::test]
async fn retrieval_failure_is_soft() {
    let provider = CannedProvider::new("answer without notes");
    let resp = orchestrator(provider)
        .with_retriever(Arc::new(BrokenRetriever))
        .ask(AskRequest::new("explain entropy"))
        .await
        .unwrap();

    assert_eq!(resp.memory_quality, MemoryQuality::None);
    assert_eq!(resp.answer, "answer without notes");
}

#[tokio::test]
async fn memory_opt_out_skips_retrieval() {
    let provider = CannedProvider::new("ok");
    let retriever = Arc::new(CountingRetriever::default());
    let mut request = AskRequest::new("explain entropy");
    request.use_memory = false;

    let resp = orchestrator(provider)
        .with_retriever(retriever.clone())
        .ask(request)
        .await
        .unwrap();

    assert_eq!(resp.memory_quality, MemoryQuality::None);
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn forced_mode_overrides_resolution() {
    let provider = Arc::new(TranscriptProvider::default());
    let mut request = AskRequest::new("explain osmosis");
    request.mode = Some(Mode::Review);

    let resp = orchestrator(provider.clone()).ask(request).await.unwrap();
    assert_eq!(resp.mode, Mode::Review);
    assert!(resp.answer.contains("MODE: REVIEW"));
    assert_eq!(provider.seen.lock().unwrap()[0].model, "qwen2.5:14b");
}

#[tokio::test]
async fn empty_message_is_rejected_before_generation() {
    let provider = CannedProvider::new("unused");
    let err = orchestrator(provider.clone())
        .ask(AskRequest::new("   "))
        .await
        .unwrap_err();

    assert!(matches!(err, StudyError::InputValidation(_)));
    assert_eq!(err.to_string(), "Message cannot be empty");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn generation_failure_is_terminal() {
    let err = orchestrator(Arc::new(FailProvider))
        .ask(AskRequest::new("explain osmosis"))
        .await
        .unwrap_err();

    assert!(matches!(err, StudyError::Generation(_)));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn study_plan_attaches_strong_materials() {
    let provider = Arc::new(TranscriptProvider::default());
    let orch = orchestrator(provider.clone()).with_retriever(strong_notes());

    let resp = orch
        .create_study_plan(&StudyPlanRequest {
            subject: "Cell biology".into(),
            days: 5,
            current_knowledge: Some("I know the basics".into()),
            retrieve_materials: true,
        })
        .await
        .unwrap();

    assert_eq!(resp.days, 5);
    assert_eq!(resp.materials_used, 2);
    assert!(resp.plan.contains("Create a detailed 5-day study plan for: Cell biology"));
    assert!(resp.plan.contains(
        "Current knowledge level: I know the basics\n\nAvailable study materials:\n- Mitochondria produce ATP"
    ));
    assert!(!resp.plan.contains("Shopping list"));
    assert_eq!(provider.seen.lock().unwrap()[0].model, "mixtral");
}

#[tokio::test]
async fn study_plan_validates_input() {
    let orch = orchestrator(CannedProvider::new("plan"));
    for (subject, days) in [("", 5), ("Math", 0), ("Math", 366)] {
        let err = orch
            .create_study_plan(&StudyPlanRequest {
                subject: subject.into(),
                days,
                current_knowledge: None,
                retrieve_materials: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InputValidation(_)));
    }
}

#[tokio::test]
async fn flashcard_engine_runs_through_structured_route() {
    let provider = Arc::new(TranscriptProvider::default());
    let cards = CannedProvider::new(
        r#"[{"type": "why", "question": "Why do cells need ATP?", "answer": "To power reactions.", "exam_relevance": 9}]"#,
    );

    let engine = FlashcardEngine::new(router(cards));
    let batch = engine
        .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "ATP notes", 3))
        .await
        .unwrap();
    assert_eq!(batch.count, 1);
    assert_eq!(batch.requested, 3);
    assert_eq!(batch.flashcards[0].exam_relevance, 9);

    // Prompt reaches the structured model with the exam-grade temperature.
    let engine = FlashcardEngine::new(router(provider.clone()));
    let _ = engine
        .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "ATP notes", 3))
        .await;
    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen[0].model, "qwen2.5:14b");
    assert_eq!(seen[0].temperature, Some(0.4));
}
