//! Prompt text for the flashcard generators.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use studypilot_schema::{CardType, Difficulty, MistakeRecord};

pub const MAX_CONTENT_CHARS: usize = 8000;
pub const MAX_PROMPT_MISTAKES: usize = 5;
pub const MAX_TRAP_MISTAKES: usize = 10;

const CARD_TYPE_DEFINITIONS: &str = r#"🎯 CARD TYPE DEFINITIONS:
- definition: "What is X?" → Define the core concept clearly
- why: "Why does X happen/exist?" → Explain causation or purpose
- how: "How does X work/happen?" → Describe the process or mechanism
- compare: "Compare X vs Y" or "What's the difference between X and Y?"
- trap: "What's a common misconception about X?" → Bust myths, prevent exam mistakes
- example: "Give an example of X" → Concrete, memorable application
- exam: Exactly like a real exam question would be phrased"#;

const QUALITY_RULES: &str = "✅ STRICT QUALITY RULES:
1. ONE concept per card - NEVER combine multiple facts
2. Answers must be 2-5 lines - not one-liners, not essays
3. Questions must be clear and unambiguous
4. Include key_terms that should trigger recall
5. exam_relevance: 1-10 (10 = almost certainly on exam)";

pub struct ExamGradePrompt<'a> {
    pub topic: &'a str,
    pub content: &'a str,
    pub count: usize,
    pub difficulty: Difficulty,
    pub type_counts: &'a BTreeMap<CardType, usize>,
    pub mistakes: &'a [String],
}

impl ExamGradePrompt<'_> {
    pub fn render(&self) -> String {
        let mut out = format!(
            "You are an EXAM-GRADE flashcard generator. Create {} flashcards from the content below.\n\n",
            self.count
        );
        let _ = writeln!(out, "📚 TOPIC: {}", self.topic);
        let _ = writeln!(out, "📊 TARGET DIFFICULTY: {}", self.difficulty);

        if !self.mistakes.is_empty() {
            out.push_str("\n⚠️ USER'S PAST MISTAKES (generate TRAP cards targeting these):\n");
            for mistake in self.mistakes.iter().take(MAX_PROMPT_MISTAKES) {
                let _ = writeln!(out, "- {mistake}");
            }
        }

        out.push_str("\n📋 REQUIRED CARD TYPE DISTRIBUTION:\n");
        for (card_type, n) in self.type_counts {
            let _ = writeln!(out, "- {n}x {card_type} cards");
        }

        out.push('\n');
        out.push_str(CARD_TYPE_DEFINITIONS);
        out.push_str("\n\n");
        out.push_str(QUALITY_RULES);

        let content: String = self.content.chars().take(MAX_CONTENT_CHARS).collect();
        let _ = write!(out, "\n\n📝 CONTENT TO PROCESS:\n{content}\n\n");

        out.push_str(&output_format(&[
            ("type", "\"definition\"".into()),
            ("question", "\"What is [concept]?\"".into()),
            ("answer", "\"A clear 2-5 line answer explaining the concept.\"".into()),
            ("difficulty", format!("\"{}\"", self.difficulty)),
            ("topic", quoted(self.topic)),
            ("subtopic", "\"specific subtopic or null\"".into()),
            ("exam_relevance", "8".into()),
            ("key_terms", "[\"term1\", \"term2\"]".into()),
            ("mistake_prone", "false".into()),
        ]));
        let _ = write!(
            out,
            "\n\nGenerate exactly {} cards. Return ONLY the JSON array, no markdown.",
            self.count
        );
        out
    }
}

pub fn trap_prompt(topic: &str, mistakes: &[MistakeRecord], count: usize) -> String {
    let listed: Vec<String> = mistakes
        .iter()
        .take(MAX_TRAP_MISTAKES)
        .map(|m| {
            format!(
                "Q: {}\nWrong Answer: {}\nCorrect Answer: {}",
                m.question, m.wrong_answer, m.correct_answer
            )
        })
        .collect();

    let mut out = format!(
        "Generate {count} TRAP flashcards to prevent these exact mistakes from happening again.\n\n"
    );
    let _ = write!(out, "🚨 USER'S MISTAKES:\n{}\n\n", listed.join("\n"));
    let _ = write!(out, "📚 TOPIC: {topic}\n\n");
    out.push_str(
        "Create TRAP cards that:
1. Directly address the misconception
2. Explain WHY the wrong answer is wrong
3. Make the correct understanding unforgettable
4. Prevent this exact mistake on future exams\n\n",
    );
    out.push_str(&output_format(&[
        ("type", "\"trap\"".into()),
        ("question", "\"What's the common mistake about [concept]?\"".into()),
        (
            "answer",
            "\"Many students incorrectly think [wrong belief]. Actually, [correct understanding] because [reason].\"".into(),
        ),
        ("difficulty", "\"intermediate\"".into()),
        ("topic", quoted(topic)),
        ("subtopic", "null".into()),
        ("exam_relevance", "9".into()),
        ("key_terms", "[\"term1\"]".into()),
        ("mistake_prone", "true".into()),
    ]));
    out.push_str("\n\nReturn ONLY the JSON array.");
    out
}

pub fn exam_simulation_prompt(
    topic: &str,
    subtopics: &[String],
    exam_format: &str,
    count: usize,
) -> String {
    let mut out = format!(
        "Generate {count} EXAM-STYLE flashcards that could appear on a real {exam_format} exam.\n\n"
    );
    let _ = write!(out, "📚 TOPIC: {topic}\n\n📋 SUBTOPICS TO COVER:\n");
    for subtopic in subtopics {
        let _ = writeln!(out, "- {subtopic}");
    }
    out.push_str(
        "\nCreate exam-style questions that:
1. Are phrased exactly like real exam questions
2. Test understanding, not just memorization
3. Include common exam \"tricks\" students should watch for
4. Cover the most likely exam topics\n\n",
    );
    out.push_str(&output_format(&[
        ("type", "\"exam\"".into()),
        ("question", "\"[Exam-style question phrasing]\"".into()),
        ("answer", "\"[Complete answer with reasoning, 2-5 lines]\"".into()),
        ("difficulty", "\"advanced\"".into()),
        ("topic", quoted(topic)),
        ("subtopic", "\"[specific subtopic]\"".into()),
        ("exam_relevance", "10".into()),
        ("key_terms", "[\"term1\", \"term2\"]".into()),
        ("mistake_prone", "false".into()),
    ]));
    out.push_str("\n\nReturn ONLY the JSON array.");
    out
}

fn output_format(fields: &[(&str, String)]) -> String {
    let body: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("    \"{key}\": {value}"))
        .collect();
    format!(
        "🔧 OUTPUT FORMAT - Return ONLY valid JSON array:\n[\n  {{\n{}\n  }}\n]",
        body.join(",\n")
    )
}

fn quoted(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}
