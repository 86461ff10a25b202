//! Exam-grade flashcard records and the requests that produce them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The seven fixed flashcard categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Definition,
    Why,
    How,
    Compare,
    Trap,
    Example,
    Exam,
}

impl CardType {
    pub const ALL: [CardType; 7] = [
        CardType::Definition,
        CardType::Why,
        CardType::How,
        CardType::Compare,
        CardType::Trap,
        CardType::Example,
        CardType::Exam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Why => "why",
            Self::How => "how",
            Self::Compare => "compare",
            Self::Trap => "trap",
            Self::Example => "example",
            Self::Exam => "exam",
        }
    }

    /// Lenient lookup used when coercing generated card data.
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lower)
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s).ok_or_else(|| anyhow!("unknown card type: {s}"))
    }
}

/// Difficulty ladder, ordered from easiest to hardest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Intermediate
    }
}

impl Difficulty {
    pub const LADDER: [Difficulty; 4] = [
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }

    pub fn parse_loose(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        Self::LADDER.into_iter().find(|d| d.as_str() == lower)
    }

    pub fn harder(self) -> Self {
        match self {
            Self::Beginner => Self::Intermediate,
            Self::Intermediate => Self::Advanced,
            Self::Advanced | Self::Expert => Self::Expert,
        }
    }

    pub fn easier(self) -> Self {
        match self {
            Self::Beginner | Self::Intermediate => Self::Beginner,
            Self::Advanced => Self::Intermediate,
            Self::Expert => Self::Advanced,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_loose(s).ok_or_else(|| anyhow!("unknown difficulty: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flashcard {
    pub id: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub topic: String,
    pub subtopic: Option<String>,
    pub source: String,
    /// 1 (unlikely on the exam) to 10 (almost certainly on it).
    pub exam_relevance: u8,
    pub key_terms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub mistake_prone: bool,
}

fn default_card_count() -> u32 {
    10
}

fn default_trap_count() -> u32 {
    5
}

fn default_source() -> String {
    "user_content".to_string()
}

fn default_exam_format() -> String {
    "multiple_choice".to_string()
}

fn default_use_memory() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamFlashcardRequest {
    pub topic: String,
    /// Source material. When absent, material is retrieved by topic.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "default_card_count")]
    pub count: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub mistakes: Vec<String>,
    #[serde(default)]
    pub force_card_types: Option<Vec<CardType>>,
    #[serde(default = "default_use_memory")]
    pub use_memory: bool,
}

impl ExamFlashcardRequest {
    pub fn new(topic: impl Into<String>, content: impl Into<String>, count: u32) -> Self {
        Self {
            topic: topic.into(),
            content: Some(content.into()),
            count,
            difficulty: Difficulty::default(),
            source: default_source(),
            mistakes: Vec::new(),
            force_card_types: None,
            use_memory: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MistakeRecord {
    pub question: String,
    pub wrong_answer: String,
    pub correct_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapCardRequest {
    pub mistakes: Vec<MistakeRecord>,
    pub topic: String,
    #[serde(default = "default_trap_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSimulationRequest {
    pub topic: String,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default = "default_exam_format")]
    pub exam_format: String,
    #[serde(default = "default_card_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardBatch {
    pub flashcards: Vec<Flashcard>,
    pub count: usize,
    pub requested: u32,
    /// Card types the generator was asked for; counts sum to `requested`.
    pub type_distribution: BTreeMap<CardType, usize>,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyAdjustRequest {
    /// Topic to accuracy in [0, 1].
    pub performance: BTreeMap<String, f64>,
    pub current: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyAdjustResponse {
    pub recommended: Difficulty,
}
