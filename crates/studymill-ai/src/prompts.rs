//! Prompt templates for the two pipeline stages.
//!
//! The summary prompt produces a structured study guide; the quiz prompt
//! produces raw JSON that [`crate::parse_quiz`] turns into a
//! [`studymill_core::Quiz`].

/// Number of questions the quiz prompt asks for
pub const QUIZ_QUESTION_COUNT: usize = 5;

const SUMMARY_TEMPLATE: &str = r#"You are a senior exam-prep instructor, expert at distilling complex
material for high-performing students.

Turn the raw text below into a strategic study guide. Do not merely
summarize; teach.

REQUIRED OUTPUT STRUCTURE:

## Core Thesis
(One dense paragraph: what problem does the text address, and what is the
author's central position?)

## Mind Map
(List the 3-5 main pillars of the text. For each pillar, explain its internal
logic. Use arrows '->' to show cause and consequence.)

## Key Terms
(Extract technical terms and key definitions. Format: **Term**: a simple,
direct definition.)

## Exam Radar
(Bullet points of what tends to appear on exams: common traps, exceptions to
rules, critical dates, counter-arguments cited in the text.)

QUALITY GUIDELINES:
- Density: cut filler words, get to the point.
- Didactics: use analogies when a concept is very abstract.
- Fidelity: rely EXCLUSIVELY on the text provided below.

SOURCE TEXT:
{text}
"#;

const QUIZ_TEMPLATE: &str = r#"Act as a rigorous examination board. Create a multiple-choice exam of
INTERMEDIATE/HARD difficulty based on the text.

QUESTION RULES:
1. Focus on interpretation: avoid questions answerable by keyword lookup
   alone. Each question must require understanding the context.
2. Plausible distractors: wrong options must NOT be absurd. They should look
   correct to an inattentive student (almost right, one detail off).
3. No cheap tricks: never use "all of the above" or "none of the above".
4. Format: generate EXACTLY {count} questions, each with 4 options.
5. Output: raw JSON only, following the requested format.

SOURCE TEXT:
{text}

{format_instructions}
"#;

const QUIZ_FORMAT_INSTRUCTIONS: &str = r#"Respond with a single JSON object and nothing else, shaped exactly like:
{"questions": [{"prompt": "the question text", "options": ["option 1", "option 2", "option 3", "option 4"], "correct_answer": "one of the options, verbatim"}]}"#;

/// Render the study-guide prompt for the given context text
pub fn summary_prompt(text: &str) -> String {
    SUMMARY_TEMPLATE.replace("{text}", text)
}

/// Render the quiz prompt for the given context text
pub fn quiz_prompt(text: &str) -> String {
    QUIZ_TEMPLATE
        .replace("{count}", &QUIZ_QUESTION_COUNT.to_string())
        .replace("{text}", text)
        .replace("{format_instructions}", QUIZ_FORMAT_INSTRUCTIONS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_embeds_text() {
        let prompt = summary_prompt("mitochondria are the powerhouse");
        assert!(prompt.contains("mitochondria are the powerhouse"));
        assert!(prompt.contains("## Exam Radar"));
        assert!(!prompt.contains("{text}"));
    }

    #[test]
    fn test_quiz_prompt_is_fully_rendered() {
        let prompt = quiz_prompt("some source text");
        assert!(prompt.contains("some source text"));
        assert!(prompt.contains("EXACTLY 5 questions"));
        assert!(prompt.contains("\"correct_answer\""));
        assert!(!prompt.contains("{count}"));
        assert!(!prompt.contains("{format_instructions}"));
    }
}
