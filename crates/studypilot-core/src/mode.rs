use studypilot_schema::{Mode, StudyState};

/// Phrase groups checked in order; the first group with a hit wins.
const MODE_PHRASES: &[(Mode, &[&str])] = &[
    (
        Mode::Plan,
        &[
            "create a plan",
            "make a plan",
            "study plan",
            "schedule",
            "organize my study",
            "how should i study",
            "roadmap",
        ],
    ),
    (
        Mode::Quiz,
        &[
            "quiz me",
            "test me",
            "ask me questions",
            "practice questions",
            "check my knowledge",
        ],
    ),
    (Mode::Flashcards, &["flashcard", "flash card"]),
    (
        Mode::Review,
        &[
            "review",
            "summarize",
            "summary",
            "recap",
            "key points",
            "what should i remember",
        ],
    ),
    (
        Mode::Coach,
        &[
            "struggling",
            "stuck",
            "lost",
            "confused",
            "overwhelmed",
            "behind",
            "can't focus",
            "help me",
            "motivate",
            "failed",
            "procrastinating",
            "what should i do",
        ],
    ),
    (
        Mode::Explain,
        &[
            "explain",
            "what is",
            "what are",
            "how does",
            "how do",
            "why",
            "tell me about",
            "teach me",
            "help me understand",
        ],
    ),
];

/// Exam proximity (in days) that pulls an unmatched message into planning.
const PLAN_EXAM_WINDOW_DAYS: u32 = 7;

/// Picks exactly one mode for a message. Never fails.
pub fn resolve_mode(message: &str, state: Option<&StudyState>) -> Mode {
    let lower = message.trim().to_lowercase();

    if let Some(mode) = match_phrases(&lower) {
        return mode;
    }

    if let Some(state) = state {
        if !state.has_focus_today() && state.urgent_task_count > 0 {
            return Mode::Coach;
        }
        if state.overdue_tasks > 2 {
            return Mode::Coach;
        }
        if state
            .days_until_exam
            .is_some_and(|days| days <= PLAN_EXAM_WINDOW_DAYS)
        {
            return Mode::Plan;
        }
    }

    Mode::Explain
}

fn match_phrases(lower: &str) -> Option<Mode> {
    MODE_PHRASES
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(mode, _)| *mode)
}
