use studypilot_schema::{StudyState, Suggestion, SuggestionPriority};

use crate::intervention::plural;

pub const MAX_SUGGESTIONS: usize = 3;

/// Derives up to three proactive nudges, most pressing first.
///
/// Ties keep discovery order.
pub fn rank_suggestions(state: &StudyState, hour: u32) -> Vec<Suggestion> {
    let mut found = Vec::new();

    if state.focus_minutes_today == 0 && (8..=22).contains(&hour) {
        let message = match &state.current_course {
            Some(course) => format!("Start 25-min focus on {course}"),
            None => "Start 25-min focus".to_string(),
        };
        found.push(suggestion(
            "no-focus",
            message,
            "Help me start a focused study session",
            if state.urgent_task_count > 0 {
                SuggestionPriority::Urgent
            } else {
                SuggestionPriority::High
            },
            "🎯",
        ));
    }

    if state.flashcards_due > 0 {
        found.push(suggestion(
            "flashcards-due",
            format!(
                "Review {} {} due",
                state.flashcards_due,
                plural(state.flashcards_due, "flashcard", "flashcards")
            ),
            "Let's review my due flashcards",
            if state.flashcards_due > 20 {
                SuggestionPriority::Urgent
            } else {
                SuggestionPriority::Normal
            },
            "🃏",
        ));
    }

    if state.overdue_tasks > 0 {
        found.push(suggestion(
            "overdue-tasks",
            format!(
                "{} overdue {} - let's catch up",
                state.overdue_tasks,
                plural(state.overdue_tasks, "task", "tasks")
            ),
            "Help me prioritize my overdue tasks",
            SuggestionPriority::Urgent,
            "⚠️",
        ));
    }

    if state.streak_days > 0 && state.focus_minutes_today == 0 && hour >= 18 {
        found.push(suggestion(
            "streak-risk",
            format!("Keep your {}-day streak alive", state.streak_days),
            "Help me do a quick study session to keep my streak",
            if hour >= 21 {
                SuggestionPriority::Urgent
            } else {
                SuggestionPriority::High
            },
            "🔥",
        ));
    }

    // sort_by_key is stable
    found.sort_by_key(|s| s.priority.rank());
    found.truncate(MAX_SUGGESTIONS);
    found
}

fn suggestion(
    id: &str,
    message: String,
    action: &str,
    priority: SuggestionPriority,
    icon: &str,
) -> Suggestion {
    Suggestion {
        id: id.to_string(),
        message,
        action: action.to_string(),
        priority,
        icon: icon.to_string(),
    }
}
