use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use studypilot_schema::{CardType, Difficulty, Flashcard};

use crate::error::{StudyError, StudyResult};
use crate::extract::extract_json_array;

const DEFAULT_EXAM_RELEVANCE: u8 = 5;
const MAX_EXAM_RELEVANCE: u64 = 10;

/// Card id sequence shared by every validator in the process.
static CARD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Turns generated card data into typed flashcards.
///
/// Malformed entries are dropped; a batch only fails when nothing survives.
#[derive(Debug, Default)]
pub struct FlashcardValidator;

impl FlashcardValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, raw: &str, topic: &str, source: &str) -> StudyResult<Vec<Flashcard>> {
        self.parse_at(raw, topic, source, Utc::now())
    }

    pub fn parse_at(
        &self,
        raw: &str,
        topic: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> StudyResult<Vec<Flashcard>> {
        let Some(entries) = extract_json_array(raw) else {
            let preview: String = raw.chars().take(200).collect();
            tracing::warn!(preview = %preview, "no flashcard array in generated text");
            return Err(StudyError::format(
                "AI returned invalid JSON: no flashcard array found",
            ));
        };

        let total = entries.len();
        let cards: Vec<Flashcard> = entries
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|entry| self.card_from_entry(entry, topic, source, now))
            .collect();

        if cards.len() < total {
            tracing::warn!(
                kept = cards.len(),
                dropped = total - cards.len(),
                "skipped malformed flashcards"
            );
        }

        if cards.is_empty() {
            return Err(StudyError::format(
                "No valid flashcards could be parsed from AI response",
            ));
        }
        Ok(cards)
    }

    fn card_from_entry(
        &self,
        entry: &Map<String, Value>,
        topic: &str,
        source: &str,
        now: DateTime<Utc>,
    ) -> Option<Flashcard> {
        let question = non_empty_str(entry.get("question"))?;
        let answer = non_empty_str(entry.get("answer"))?;

        let card_type = entry
            .get("type")
            .and_then(Value::as_str)
            .and_then(CardType::parse_loose)
            .unwrap_or(CardType::Definition);

        let difficulty = entry
            .get("difficulty")
            .and_then(Value::as_str)
            .and_then(Difficulty::parse_loose)
            .unwrap_or_default();

        let key_terms = entry
            .get("key_terms")
            .and_then(Value::as_array)
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let subtopic = non_empty_str(entry.get("subtopic"))
            .filter(|s| !s.eq_ignore_ascii_case("null"));

        Some(Flashcard {
            id: self.next_id(now),
            card_type,
            question,
            answer,
            difficulty,
            topic: topic.to_string(),
            subtopic,
            source: source.to_string(),
            exam_relevance: exam_relevance(entry.get("exam_relevance")),
            key_terms,
            created_at: now,
            mistake_prone: entry
                .get("mistake_prone")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    fn next_id(&self, now: DateTime<Utc>) -> String {
        let n = CARD_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        format!("card_{}_{n}", now.format("%Y%m%d%H%M%S"))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Integers >= 1 are capped at 10; anything else falls back to 5.
fn exam_relevance(value: Option<&Value>) -> u8 {
    match value.and_then(Value::as_u64) {
        Some(n) if n >= 1 => n.min(MAX_EXAM_RELEVANCE) as u8,
        _ => DEFAULT_EXAM_RELEVANCE,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    #[test]
    fn keeps_good_card_and_drops_empty_answer() {
        let raw = r#"[
            {"question": "What is ATP?", "answer": "The cell's energy currency."},
            {"question": "Why?", "answer": "   "}
        ]"#;
        let cards = FlashcardValidator::new().parse(raw, "Cells", "user_content").unwrap();
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].question, "What is ATP?");
        assert_eq!(cards[0].topic, "Cells");
        assert_eq!(cards[0].source, "user_content");
    }

    #[test]
    fn all_answerless_entries_fail_the_batch() {
        let raw = r#"[{"question": "A?"}, {"question": "B?", "answer": ""}]"#;
        let err = FlashcardValidator::new().parse(raw, "t", "s").unwrap_err();
        assert!(matches!(err, StudyError::GenerationFormat(_)));
    }

    #[test]
    fn no_array_is_format_error() {
        let err = FlashcardValidator::new()
            .parse("I could not generate cards.", "t", "s")
            .unwrap_err();
        assert!(err.to_string().contains("invalid JSON"));

        let err = FlashcardValidator::new()
            .parse(r#"{"question": "Q", "answer": "A"}"#, "t", "s")
            .unwrap_err();
        assert!(matches!(err, StudyError::GenerationFormat(_)));
    }

    #[test]
    fn coerces_fields() {
        let raw = json!([{
            "type": "TRAP",
            "question": "  Common mistake about osmosis?  ",
            "answer": "Water moves toward higher solute concentration.",
            "difficulty": "Expert",
            "subtopic": "Transport",
            "exam_relevance": 42,
            "key_terms": ["osmosis", 3, "solute"],
            "mistake_prone": true
        }])
        .to_string();
        let card = &FlashcardValidator::new()
            .parse_at(&raw, "Cells", "mistake_analysis", fixed_now())
            .unwrap()[0];
        assert_eq!(card.card_type, CardType::Trap);
        assert_eq!(card.question, "Common mistake about osmosis?");
        assert_eq!(card.difficulty, Difficulty::Expert);
        assert_eq!(card.subtopic.as_deref(), Some("Transport"));
        assert_eq!(card.exam_relevance, 10);
        assert_eq!(card.key_terms, vec!["osmosis", "solute"]);
        assert!(card.mistake_prone);
        assert_eq!(card.created_at, fixed_now());
    }

    #[test]
    fn unknown_or_missing_values_use_defaults() {
        let raw = json!([
            {"type": "mnemonic", "question": "Q1", "answer": "A1", "difficulty": "insane",
             "exam_relevance": 0, "key_terms": "osmosis", "subtopic": "null", "mistake_prone": "yes"},
            {"question": "Q2", "answer": "A2", "exam_relevance": 7.5},
            {"question": "Q3", "answer": "A3", "exam_relevance": -3},
            {"question": "Q4", "answer": "A4", "exam_relevance": "9"}
        ])
        .to_string();
        let cards = FlashcardValidator::new().parse(&raw, "t", "s").unwrap();
        assert_eq!(cards.len(), 4);
        assert_eq!(cards[0].card_type, CardType::Definition);
        assert_eq!(cards[0].difficulty, Difficulty::Intermediate);
        assert!(cards[0].key_terms.is_empty());
        assert!(cards[0].subtopic.is_none());
        assert!(!cards[0].mistake_prone);
        assert!(cards.iter().all(|c| c.exam_relevance == 5));
    }

    #[test]
    fn non_object_entries_are_skipped() {
        let raw = r#"["just a string", 4, {"question": "Q", "answer": "A"}]"#;
        let cards = FlashcardValidator::new().parse(raw, "t", "s").unwrap();
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn fenced_output_is_accepted() {
        let raw = "Here are your cards:\n```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```";
        assert_eq!(FlashcardValidator::new().parse(raw, "t", "s").unwrap().len(), 1);
    }

    #[test]
    fn ids_are_unique_and_timestamped() {
        let validator = FlashcardValidator::new();
        let raw = r#"[{"question": "Q1", "answer": "A1"}, {"question": "Q2", "answer": "A2"}]"#;
        let first = validator.parse_at(raw, "t", "s", fixed_now()).unwrap();
        let second = validator.parse_at(raw, "t", "s", fixed_now()).unwrap();

        assert!(first[0].id.starts_with("card_20260314092653_"));
        let ids: HashSet<&str> = first.iter().chain(&second).map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn separate_validators_never_share_an_id() {
        let raw = r#"[{"question": "Q", "answer": "A"}]"#;
        let a = FlashcardValidator::new().parse_at(raw, "t", "s", fixed_now()).unwrap();
        let b = FlashcardValidator::new().parse_at(raw, "t", "s", fixed_now()).unwrap();
        assert_ne!(a[0].id, b[0].id);
    }
}
