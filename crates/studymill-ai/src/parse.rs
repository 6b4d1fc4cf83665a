use crate::{AiError, Result};
use studymill_core::Quiz;
use tracing::warn;

/// Parse the model's quiz reply into a validated [`Quiz`].
///
/// Models wrap JSON in code fences or preface it with prose despite being
/// told not to, so the parser extracts the outermost JSON object before
/// deserializing.
pub fn parse_quiz(raw: &str) -> Result<Quiz> {
    let json = extract_json_object(raw)
        .ok_or_else(|| AiError::InvalidResponse("reply contains no JSON object".to_string()))?;

    let quiz: Quiz = serde_json::from_str(json)
        .map_err(|e| AiError::InvalidResponse(format!("quiz JSON does not parse: {e}")))?;

    quiz.validate()?;

    if quiz.questions.len() != crate::QUIZ_QUESTION_COUNT {
        warn!(
            expected = crate::QUIZ_QUESTION_COUNT,
            actual = quiz.questions.len(),
            "Model returned an unexpected number of quiz questions"
        );
    }

    Ok(quiz)
}

/// Slice out the outermost `{ ... }` of the reply, if any.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
