use std::collections::BTreeMap;
use std::sync::Arc;

use studypilot_memory::Retriever;
use studypilot_schema::{
    CardType, Difficulty, ExamFlashcardRequest, ExamSimulationRequest, Flashcard, FlashcardBatch,
    TrapCardRequest,
};

use super::distribution::{distribute, type_counts};
use super::prompts::{exam_simulation_prompt, trap_prompt, ExamGradePrompt};
use super::validator::FlashcardValidator;
use crate::error::{StudyError, StudyResult};
use crate::generation::{Channel, GenerationRequest, Generator};
use crate::relevance::RelevanceGate;

pub const MAX_CARDS_PER_BATCH: u32 = 50;

const MEMORY_TOP_K: usize = 10;
const MEMORY_CONTENT_CHUNKS: usize = 5;

const EXAM_GRADE_TEMPERATURE: f32 = 0.4;
const TRAP_TEMPERATURE: f32 = 0.3;
const EXAM_SIMULATION_TEMPERATURE: f32 = 0.5;

const SOURCE_TOPIC_ONLY: &str = "topic_only";
const SOURCE_MISTAKES: &str = "mistake_analysis";
const SOURCE_EXAM_SIMULATION: &str = "exam_simulation";

/// Generates exam-grade, trap and exam-simulation flashcard batches.
pub struct FlashcardEngine {
    generator: Arc<dyn Generator>,
    retriever: Option<Arc<dyn Retriever>>,
    gate: RelevanceGate,
    validator: FlashcardValidator,
}

impl FlashcardEngine {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator,
            retriever: None,
            gate: RelevanceGate::default(),
            validator: FlashcardValidator::new(),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_gate(mut self, gate: RelevanceGate) -> Self {
        self.gate = gate;
        self
    }

    pub async fn generate_exam_grade(
        &self,
        request: &ExamFlashcardRequest,
    ) -> StudyResult<FlashcardBatch> {
        let topic = require_text(&request.topic, "Topic cannot be empty")?;
        let count = validate_count(request.count)?;

        let plan = match &request.force_card_types {
            Some(forced) if forced.len() == count => forced.clone(),
            _ => distribute(count),
        };
        let planned = type_counts(&plan);

        let (content, source) = self.resolve_content(request, topic).await;

        let prompt = ExamGradePrompt {
            topic,
            content: &content,
            count,
            difficulty: request.difficulty,
            type_counts: &planned,
            mistakes: &request.mistakes,
        }
        .render();

        tracing::info!(topic, count, source = %source, "generating exam-grade flashcards");
        let cards = self
            .run(prompt, EXAM_GRADE_TEMPERATURE, topic, &source)
            .await?;
        Ok(batch(cards, request.count, planned, source))
    }

    pub async fn generate_trap_cards(
        &self,
        request: &TrapCardRequest,
    ) -> StudyResult<FlashcardBatch> {
        let topic = require_text(&request.topic, "Topic cannot be empty")?;
        let count = validate_count(request.count)?;
        if request.mistakes.is_empty() {
            return Err(StudyError::invalid("At least one mistake is required"));
        }

        let prompt = trap_prompt(topic, &request.mistakes, count);
        tracing::info!(topic, count, mistakes = request.mistakes.len(), "generating trap cards");
        let cards = self.run(prompt, TRAP_TEMPERATURE, topic, SOURCE_MISTAKES).await?;
        Ok(batch(
            cards,
            request.count,
            BTreeMap::from([(CardType::Trap, count)]),
            SOURCE_MISTAKES.to_string(),
        ))
    }

    pub async fn generate_exam_simulation(
        &self,
        request: &ExamSimulationRequest,
    ) -> StudyResult<FlashcardBatch> {
        let topic = require_text(&request.topic, "Topic cannot be empty")?;
        let count = validate_count(request.count)?;

        let prompt = exam_simulation_prompt(topic, &request.subtopics, &request.exam_format, count);
        tracing::info!(topic, count, format = %request.exam_format, "generating exam simulation cards");
        let cards = self
            .run(prompt, EXAM_SIMULATION_TEMPERATURE, topic, SOURCE_EXAM_SIMULATION)
            .await?;
        Ok(batch(
            cards,
            request.count,
            BTreeMap::from([(CardType::Exam, count)]),
            SOURCE_EXAM_SIMULATION.to_string(),
        ))
    }

    async fn resolve_content(&self, request: &ExamFlashcardRequest, topic: &str) -> (String, String) {
        if let Some(content) = request.content.as_deref().filter(|c| !c.trim().is_empty()) {
            return (content.to_string(), request.source.clone());
        }

        if request.use_memory {
            if let Some(retriever) = &self.retriever {
                match retriever.search(topic, MEMORY_TOP_K).await {
                    Ok(chunks) => {
                        let gated = self.gate.filter(chunks);
                        if !gated.strong.is_empty() {
                            let texts: Vec<&str> = gated
                                .strong
                                .iter()
                                .take(MEMORY_CONTENT_CHUNKS)
                                .map(|c| c.text.as_str())
                                .collect();
                            return (
                                texts.join("\n\n"),
                                format!("memory_retrieval ({} chunks)", texts.len()),
                            );
                        }
                        tracing::info!(topic, "no strong memory for flashcard topic");
                    }
                    Err(e) => tracing::warn!(topic, "flashcard memory retrieval failed: {e:#}"),
                }
            }
        }

        (
            format!("Generate flashcards about: {topic}"),
            SOURCE_TOPIC_ONLY.to_string(),
        )
    }

    async fn run(
        &self,
        prompt: String,
        temperature: f32,
        topic: &str,
        source: &str,
    ) -> StudyResult<Vec<Flashcard>> {
        tracing::debug!(prompt_chars = prompt.len(), "flashcard prompt built");
        let request = GenerationRequest::new(Channel::Structured, prompt)
            .with_system(Channel::Structured.default_system_prompt())
            .with_temperature(temperature);
        let raw = self
            .generator
            .generate(request)
            .await
            .map_err(StudyError::Generation)?;

        let cards = self.validator.parse(&raw, topic, source)?;
        tracing::info!(topic, generated = cards.len(), "flashcards validated");
        Ok(cards)
    }
}

/// Steps difficulty up at >= 90% mean accuracy and down at <= 60%.
pub fn recommend_difficulty(performance: &BTreeMap<String, f64>, current: Difficulty) -> Difficulty {
    let mean = if performance.is_empty() {
        0.0
    } else {
        performance.values().sum::<f64>() / performance.len() as f64
    };

    if mean >= 0.90 {
        current.harder()
    } else if mean <= 0.60 {
        current.easier()
    } else {
        current
    }
}

fn validate_count(count: u32) -> StudyResult<usize> {
    if !(1..=MAX_CARDS_PER_BATCH).contains(&count) {
        return Err(StudyError::invalid(format!(
            "count must be between 1 and {MAX_CARDS_PER_BATCH}"
        )));
    }
    Ok(count as usize)
}

fn require_text<'a>(text: &'a str, reason: &str) -> StudyResult<&'a str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StudyError::invalid(reason));
    }
    Ok(trimmed)
}

fn batch(
    flashcards: Vec<Flashcard>,
    requested: u32,
    type_distribution: BTreeMap<CardType, usize>,
    source: String,
) -> FlashcardBatch {
    FlashcardBatch {
        count: flashcards.len(),
        flashcards,
        requested,
        type_distribution,
        source,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use studypilot_memory::StaticRetriever;
    use studypilot_schema::{MemoryChunk, MistakeRecord};

    use super::*;

    const TWO_CARDS: &str = r#"[
        {"type": "definition", "question": "What is osmosis?", "answer": "Diffusion of water."},
        {"type": "trap", "question": "Common osmosis mistake?", "answer": "Water follows solute."}
    ]"#;

    struct ScriptedGenerator {
        reply: anyhow::Result<String>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        fn replying(text: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!("connection refused")),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> GenerationRequest {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, request: GenerationRequest) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    #[tokio::test]
    async fn exam_grade_uses_structured_channel_and_plan() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let engine = FlashcardEngine::new(generator.clone());

        let batch = engine
            .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "Osmosis notes", 10))
            .await
            .unwrap();

        assert_eq!(batch.count, 2);
        assert_eq!(batch.requested, 10);
        assert_eq!(batch.type_distribution.values().sum::<usize>(), 10);
        assert_eq!(batch.source, "user_content");
        assert!(batch.flashcards.iter().all(|c| c.source == "user_content"));

        let sent = generator.last();
        assert_eq!(sent.channel, Channel::Structured);
        assert_eq!(sent.temperature, Some(EXAM_GRADE_TEMPERATURE));
        assert!(sent.prompt.contains("Osmosis notes"));
    }

    #[tokio::test]
    async fn forced_types_used_only_when_length_matches() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let engine = FlashcardEngine::new(generator.clone());

        let mut request = ExamFlashcardRequest::new("Cells", "notes", 2);
        request.force_card_types = Some(vec![CardType::How, CardType::How]);
        let batch = engine.generate_exam_grade(&request).await.unwrap();
        assert_eq!(batch.type_distribution, BTreeMap::from([(CardType::How, 2)]));

        request.force_card_types = Some(vec![CardType::How]);
        let batch = engine.generate_exam_grade(&request).await.unwrap();
        assert_eq!(batch.type_distribution.values().sum::<usize>(), 2);
    }

    #[tokio::test]
    async fn missing_content_pulls_strong_memory() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let retriever = Arc::new(StaticRetriever::new(vec![
            MemoryChunk::new("Osmosis moves water across membranes.", 0.92),
            MemoryChunk::new("Active transport uses ATP.", 0.71),
            MemoryChunk::new("Unrelated recipe.", 0.12),
        ]));
        let engine = FlashcardEngine::new(generator.clone()).with_retriever(retriever);

        let mut request = ExamFlashcardRequest::new("Cells", "", 5);
        request.content = None;
        let batch = engine.generate_exam_grade(&request).await.unwrap();

        assert_eq!(batch.source, "memory_retrieval (2 chunks)");
        let prompt = generator.last().prompt;
        assert!(prompt.contains("Osmosis moves water across membranes.\n\nActive transport uses ATP."));
        assert!(!prompt.contains("Unrelated recipe."));
    }

    #[tokio::test]
    async fn weak_memory_falls_back_to_topic_only() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let retriever = Arc::new(StaticRetriever::new(vec![MemoryChunk::new("faint", 0.2)]));
        let engine = FlashcardEngine::new(generator.clone()).with_retriever(retriever);

        let request = ExamFlashcardRequest::new("Genetics", "   ", 5);
        let batch = engine.generate_exam_grade(&request).await.unwrap();

        assert_eq!(batch.source, "topic_only");
        assert!(generator.last().prompt.contains("Generate flashcards about: Genetics"));
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_generator() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let engine = FlashcardEngine::new(generator.clone());

        for count in [0, 51] {
            let err = engine
                .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "notes", count))
                .await
                .unwrap_err();
            assert!(matches!(err, StudyError::InputValidation(_)));
        }
        let err = engine
            .generate_exam_grade(&ExamFlashcardRequest::new("  ", "notes", 5))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Topic cannot be empty");

        let err = engine
            .generate_trap_cards(&TrapCardRequest {
                mistakes: vec![],
                topic: "Cells".into(),
                count: 5,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InputValidation(_)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn trap_cards_are_attributed_to_mistakes() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let engine = FlashcardEngine::new(generator.clone());

        let batch = engine
            .generate_trap_cards(&TrapCardRequest {
                mistakes: vec![MistakeRecord {
                    question: "What does osmosis move?".into(),
                    wrong_answer: "Salt".into(),
                    correct_answer: "Water".into(),
                }],
                topic: "Cells".into(),
                count: 3,
            })
            .await
            .unwrap();

        assert_eq!(batch.source, "mistake_analysis");
        assert_eq!(batch.type_distribution, BTreeMap::from([(CardType::Trap, 3)]));
        assert_eq!(generator.last().temperature, Some(TRAP_TEMPERATURE));
        assert!(generator.last().prompt.contains("Wrong Answer: Salt"));
    }

    #[tokio::test]
    async fn exam_simulation_uses_its_temperature() {
        let generator = ScriptedGenerator::replying(TWO_CARDS);
        let engine = FlashcardEngine::new(generator.clone());

        let batch = engine
            .generate_exam_simulation(&ExamSimulationRequest {
                topic: "Genetics".into(),
                subtopics: vec!["Meiosis".into()],
                exam_format: "multiple_choice".into(),
                count: 4,
            })
            .await
            .unwrap();

        assert_eq!(batch.source, "exam_simulation");
        assert_eq!(generator.last().temperature, Some(EXAM_SIMULATION_TEMPERATURE));
    }

    #[tokio::test]
    async fn generator_failures_and_garbage_map_to_distinct_errors() {
        let engine = FlashcardEngine::new(ScriptedGenerator::failing());
        let err = engine
            .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "notes", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::Generation(_)));

        let engine = FlashcardEngine::new(ScriptedGenerator::replying("Sorry, I can't."));
        let err = engine
            .generate_exam_grade(&ExamFlashcardRequest::new("Cells", "notes", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::GenerationFormat(_)));
    }

    #[test]
    fn difficulty_moves_with_mean_accuracy() {
        let perf = |scores: &[f64]| -> BTreeMap<String, f64> {
            scores
                .iter()
                .enumerate()
                .map(|(i, s)| (format!("topic{i}"), *s))
                .collect()
        };

        assert_eq!(
            recommend_difficulty(&perf(&[0.95, 0.9]), Difficulty::Intermediate),
            Difficulty::Advanced
        );
        assert_eq!(
            recommend_difficulty(&perf(&[0.5, 0.7]), Difficulty::Intermediate),
            Difficulty::Beginner
        );
        assert_eq!(
            recommend_difficulty(&perf(&[0.75]), Difficulty::Advanced),
            Difficulty::Advanced
        );
        assert_eq!(
            recommend_difficulty(&perf(&[1.0]), Difficulty::Expert),
            Difficulty::Expert
        );
        assert_eq!(
            recommend_difficulty(&BTreeMap::new(), Difficulty::Beginner),
            Difficulty::Beginner
        );
    }
}
