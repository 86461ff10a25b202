pub mod flashcard;

pub use flashcard::*;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Snapshot of the learner's day, supplied by the client with each request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyState {
    pub focus_minutes_today: u32,
    pub target_focus_minutes: u32,
    pub habits_completed_today: u32,
    pub total_habits_today: u32,
    pub flashcards_due: u32,
    pub streak_days: u32,
    pub urgent_task_count: u32,
    pub overdue_tasks: u32,
    pub current_course: Option<String>,
    pub current_topic: Option<String>,
    pub days_until_exam: Option<u32>,
    pub recent_failures: Vec<String>,
}

impl Default for StudyState {
    fn default() -> Self {
        Self {
            focus_minutes_today: 0,
            target_focus_minutes: 120,
            habits_completed_today: 0,
            total_habits_today: 0,
            flashcards_due: 0,
            streak_days: 0,
            urgent_task_count: 0,
            overdue_tasks: 0,
            current_course: None,
            current_topic: None,
            days_until_exam: None,
            recent_failures: Vec::new(),
        }
    }
}

impl StudyState {
    pub fn has_focus_today(&self) -> bool {
        self.focus_minutes_today > 0
    }
}

/// Interaction mode governing prompt shape and output contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Plan,
    Explain,
    Quiz,
    Flashcards,
    Review,
    Coach,
}

impl Mode {
    pub const ALL: [Mode; 6] = [
        Mode::Plan,
        Mode::Explain,
        Mode::Quiz,
        Mode::Flashcards,
        Mode::Review,
        Mode::Coach,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Explain => "explain",
            Self::Quiz => "quiz",
            Self::Flashcards => "flashcards",
            Self::Review => "review",
            Self::Coach => "coach",
        }
    }

    /// Modes whose output contract is machine-parsed JSON.
    pub fn expects_structured_output(&self) -> bool {
        matches!(self, Self::Plan | Self::Quiz | Self::Flashcards)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| anyhow!("unknown mode: {s}"))
    }
}

/// A retrieved piece of the learner's study material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChunk {
    pub text: String,
    #[serde(rename = "relevance_score", alias = "score")]
    pub score: f32,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

impl MemoryChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            source: None,
            topic: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryQuality {
    Strong,
    Weak,
    None,
}

impl MemoryQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Weak => "weak",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionPriority {
    High,
    Medium,
    Low,
}

/// Policy-triggered redirect that preempts normal mode processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub should_intervene: bool,
    pub message: String,
    pub suggested_mode: Mode,
    pub priority: InterventionPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionPriority {
    Urgent,
    High,
    Normal,
}

impl SuggestionPriority {
    pub fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Normal => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub message: String,
    pub action: String,
    pub priority: SuggestionPriority,
    pub icon: String,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub message: String,
    /// Forces a mode instead of resolving one from the message.
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub context: Option<StudyState>,
    #[serde(default = "default_true")]
    pub use_memory: bool,
    #[serde(default)]
    pub skip_intervention: bool,
}

impl AskRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            mode: None,
            context: None,
            use_memory: true,
            skip_intervention: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub mode: Mode,
    pub answer: String,
    pub structured_output: Option<serde_json::Value>,
    pub intervention: Option<Intervention>,
    pub memory_used: bool,
    pub memory_quality: MemoryQuality,
    pub chunks_used: usize,
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanRequest {
    pub subject: String,
    pub days: u32,
    #[serde(default)]
    pub current_knowledge: Option<String>,
    #[serde(default = "default_true")]
    pub retrieve_materials: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanResponse {
    pub plan: String,
    pub subject: String,
    pub days: u32,
    pub materials_used: usize,
}
