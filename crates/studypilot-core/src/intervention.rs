use studypilot_schema::{Intervention, InterventionPriority, Mode, StudyState};

/// Hour from which an untouched streak counts as at risk.
const STREAK_RISK_HOUR: u32 = 20;
/// Exam proximity (in days) that redirects free-form study into review.
const EXAM_REVIEW_WINDOW_DAYS: u32 = 3;

/// Decides whether a higher-priority redirect should replace the request.
///
/// Rules are evaluated in a fixed order and the first match wins.
pub fn check_intervention(mode: Mode, state: &StudyState, hour: u32) -> Option<Intervention> {
    if mode == Mode::Explain && state.focus_minutes_today == 0 && state.urgent_task_count > 0 {
        return Some(redirect(
            format!(
                "Before we dive in: you haven't started focus time today and have {} urgent {}. Start a 25-min focus session first?",
                state.urgent_task_count,
                plural(state.urgent_task_count, "task", "tasks"),
            ),
            Mode::Coach,
        ));
    }

    if matches!(mode, Mode::Flashcards | Mode::Quiz) && state.overdue_tasks > 0 {
        return Some(redirect(
            format!(
                "You have {} overdue {}. Let's tackle those first. Which one should we start with?",
                state.overdue_tasks,
                plural(state.overdue_tasks, "task", "tasks"),
            ),
            Mode::Coach,
        ));
    }

    if hour >= STREAK_RISK_HOUR && state.focus_minutes_today == 0 && state.streak_days > 0 {
        return Some(redirect(
            format!(
                "Your {}-day streak is at risk. Just 15 minutes of focus will keep it alive. Start a quick session?",
                state.streak_days
            ),
            Mode::Coach,
        ));
    }

    if let Some(days) = state.days_until_exam {
        let focused_mode = matches!(mode, Mode::Plan | Mode::Review | Mode::Quiz);
        if days <= EXAM_REVIEW_WINDOW_DAYS && !focused_mode {
            return Some(redirect(
                format!(
                    "Your exam is in {} {}. Let's focus on high-impact review. Want a targeted revision plan?",
                    days,
                    plural(days, "day", "days"),
                ),
                Mode::Review,
            ));
        }
    }

    None
}

fn redirect(message: String, suggested_mode: Mode) -> Intervention {
    Intervention {
        should_intervene: true,
        message,
        suggested_mode,
        priority: InterventionPriority::High,
    }
}

pub(crate) fn plural<'a>(n: u32, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_state() -> StudyState {
        StudyState {
            focus_minutes_today: 45,
            ..StudyState::default()
        }
    }

    #[test]
    fn no_rule_fires_for_healthy_state() {
        for mode in Mode::ALL {
            assert!(check_intervention(mode, &idle_state(), 23).is_none());
        }
    }

    #[test]
    fn rule_one_precedes_rule_two() {
        let state = StudyState {
            urgent_task_count: 2,
            overdue_tasks: 3,
            ..StudyState::default()
        };
        let hit = check_intervention(Mode::Explain, &state, 10).unwrap();
        assert_eq!(
            hit.message,
            "Before we dive in: you haven't started focus time today and have 2 urgent tasks. Start a 25-min focus session first?"
        );
        assert_eq!(hit.suggested_mode, Mode::Coach);
        assert_eq!(hit.priority, InterventionPriority::High);
        assert!(hit.should_intervene);
    }

    #[test]
    fn singular_urgent_task() {
        let state = StudyState {
            urgent_task_count: 1,
            ..StudyState::default()
        };
        let hit = check_intervention(Mode::Explain, &state, 10).unwrap();
        assert!(hit.message.contains("have 1 urgent task."));
    }

    #[test]
    fn overdue_blocks_quiz_and_flashcards_only() {
        let state = StudyState {
            overdue_tasks: 1,
            ..idle_state()
        };
        let hit = check_intervention(Mode::Quiz, &state, 10).unwrap();
        assert_eq!(
            hit.message,
            "You have 1 overdue task. Let's tackle those first. Which one should we start with?"
        );
        assert!(check_intervention(Mode::Flashcards, &state, 10).is_some());
        assert!(check_intervention(Mode::Explain, &state, 10).is_none());
    }

    #[test]
    fn streak_risk_from_eight_pm() {
        let state = StudyState {
            streak_days: 12,
            ..StudyState::default()
        };
        assert!(check_intervention(Mode::Review, &state, 19).is_none());
        let hit = check_intervention(Mode::Review, &state, 20).unwrap();
        assert_eq!(
            hit.message,
            "Your 12-day streak is at risk. Just 15 minutes of focus will keep it alive. Start a quick session?"
        );
        assert_eq!(hit.suggested_mode, Mode::Coach);
    }

    #[test]
    fn exam_soon_redirects_to_review() {
        let state = StudyState {
            days_until_exam: Some(1),
            ..idle_state()
        };
        let hit = check_intervention(Mode::Explain, &state, 10).unwrap();
        assert_eq!(
            hit.message,
            "Your exam is in 1 day. Let's focus on high-impact review. Want a targeted revision plan?"
        );
        assert_eq!(hit.suggested_mode, Mode::Review);

        for mode in [Mode::Plan, Mode::Review, Mode::Quiz] {
            assert!(check_intervention(mode, &state, 10).is_none());
        }
    }

    #[test]
    fn exam_today_pluralises_days() {
        let state = StudyState {
            days_until_exam: Some(0),
            ..idle_state()
        };
        let hit = check_intervention(Mode::Coach, &state, 10).unwrap();
        assert!(hit.message.starts_with("Your exam is in 0 days."));
    }

    #[test]
    fn exam_four_days_out_is_ignored() {
        let state = StudyState {
            days_until_exam: Some(4),
            ..idle_state()
        };
        assert!(check_intervention(Mode::Explain, &state, 10).is_none());
    }
}
