use std::fmt::Write as _;

use studypilot_schema::{MemoryChunk, MemoryQuality, Mode, StudyState};

use crate::relevance::{GatedMemory, RelevanceGate};

const CHUNK_PREVIEW_CHARS: usize = 400;

const BASE_ROLE: &str = "You are a strict, effective study coach. You optimize for learning outcomes, not comfort.
Be decisive, concise, and actionable. No filler. No generic motivation.";

const WEAK_MEMORY_NOTE: &str = "MEMORY NOTE: Retrieved content has weak relevance. If you need user's notes, say: \"I don't have strong material on this. Want to add notes?\"";

const RESPONSE_RULES: &str = "RESPONSE RULES:
- Be concise
- Be actionable
- No filler phrases
- No generic motivation
- Respect output format exactly
- If you cannot help, say so clearly
- Always end with clear next step";

const PLAN_INSTRUCTIONS: &str = r#"MODE: PLAN
Output EXACT JSON (no other text):
{
  "goal": "clear, specific goal statement",
  "steps": [{"task": "specific action", "time": "X min"}],
  "next_action": "what to do RIGHT NOW"
}
Keep steps concrete. Time estimates realistic. Next action immediately executable."#;

const EXPLAIN_INSTRUCTIONS: &str = "MODE: EXPLAIN
Structure:
1. Start with 2-line summary (the core concept)
2. Then detailed explanation
3. End with exactly ONE check question to verify understanding
Keep it focused. If complex, break into digestible parts.";

const QUIZ_INSTRUCTIONS: &str = r#"MODE: QUIZ
Output EXACT JSON (no other text):
{"questions": [{"q": "question text", "answer": "correct answer"}]}
Generate 5 questions. Mix difficulty. Focus on understanding, not trivia."#;

const FLASHCARDS_INSTRUCTIONS: &str = r#"MODE: FLASHCARDS
Output EXACT JSON array (no other text):
[{"question": "front of card", "answer": "back of card"}]
Generate 5-7 cards. Questions test understanding. Answers concise but complete."#;

const REVIEW_INSTRUCTIONS: &str = "MODE: REVIEW
Structure:
**Summary:**
- [bullet 1]
- [bullet 2]

**Mistakes to Avoid:**
- [error 1]
- [error 2]

**Next Steps:**
- [action 1]
- [action 2]
Be specific. Reference actual content when available.";

const COACH_INSTRUCTIONS: &str = "MODE: COACH
Structure:
1. ONE sentence acknowledging the situation (no platitudes)
2. ONE corrective action (specific, not generic)
3. THE smallest possible next step (under 5 minutes)
Do not be preachy. Do not over-explain. Be direct.";

/// Output contract for a mode.
pub fn mode_instructions(mode: Mode) -> &'static str {
    match mode {
        Mode::Plan => PLAN_INSTRUCTIONS,
        Mode::Explain => EXPLAIN_INSTRUCTIONS,
        Mode::Quiz => QUIZ_INSTRUCTIONS,
        Mode::Flashcards => FLASHCARDS_INSTRUCTIONS,
        Mode::Review => REVIEW_INSTRUCTIONS,
        Mode::Coach => COACH_INSTRUCTIONS,
    }
}

/// Builds the system prompt for a mode. Output depends only on the inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler {
    gate: RelevanceGate,
}

impl PromptAssembler {
    pub fn new(gate: RelevanceGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &RelevanceGate {
        &self.gate
    }

    /// Gates raw retrieval results, then assembles.
    pub fn build(&self, mode: Mode, state: Option<&StudyState>, chunks: &[MemoryChunk]) -> String {
        let gated = self.gate.filter(chunks.to_vec());
        self.build_gated(mode, state, &gated)
    }

    pub fn build_gated(
        &self,
        mode: Mode,
        state: Option<&StudyState>,
        memory: &GatedMemory,
    ) -> String {
        let mut sections: Vec<String> = vec![BASE_ROLE.to_string()];

        if let Some(state) = state {
            sections.push(user_context(state));
        }

        match memory.quality {
            MemoryQuality::Strong => sections.push(memory_context(&memory.strong)),
            MemoryQuality::Weak => sections.push(WEAK_MEMORY_NOTE.to_string()),
            MemoryQuality::None => {}
        }

        sections.push(mode_instructions(mode).to_string());
        sections.push(RESPONSE_RULES.to_string());
        sections.join("\n\n")
    }
}

fn user_context(state: &StudyState) -> String {
    let mut out = String::from("USER CONTEXT:\n");
    let _ = writeln!(
        out,
        "- Focus today: {}/{} min",
        state.focus_minutes_today, state.target_focus_minutes
    );
    let _ = writeln!(
        out,
        "- Habits: {}/{} completed",
        state.habits_completed_today, state.total_habits_today
    );
    let _ = writeln!(out, "- Flashcards due: {}", state.flashcards_due);
    let _ = writeln!(out, "- Streak: {} days", state.streak_days);
    let _ = writeln!(out, "- Urgent tasks: {}", state.urgent_task_count);
    let _ = write!(out, "- Overdue: {}", state.overdue_tasks);
    if let Some(course) = &state.current_course {
        let _ = write!(out, "\n- Course: {course}");
    }
    if let Some(topic) = &state.current_topic {
        let _ = write!(out, "\n- Topic: {topic}");
    }
    if let Some(days) = state.days_until_exam {
        let _ = write!(out, "\n- Days until exam: {days}");
    }
    out
}

fn memory_context(chunks: &[MemoryChunk]) -> String {
    let mut out = String::from("MEMORY CONTEXT (from user's study materials):");
    for (i, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk.text.chars().take(CHUNK_PREVIEW_CHARS).collect();
        let _ = write!(
            out,
            "\n[{}] (relevance: {:.0}%) {}...",
            i + 1,
            chunk.score * 100.0,
            preview
        );
    }
    out
}
