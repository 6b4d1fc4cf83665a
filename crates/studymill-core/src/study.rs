use crate::{JobError, Result};
use serde::{Deserialize, Serialize};

/// Processing status of a study, as stored on the `studies` row.
///
/// The web tier creates studies in `Processing`; the worker moves them to
/// `Ready` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StudyStatus {
    Processing,
    Ready,
    Failed,
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::Processing => "processing",
            StudyStatus::Ready => "ready",
            StudyStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "processing" => Ok(StudyStatus::Processing),
            "ready" => Ok(StudyStatus::Ready),
            "failed" => Ok(StudyStatus::Failed),
            other => Err(JobError::InvalidStatus(other.to_string())),
        }
    }
}

/// A single multiple-choice question generated for a study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// The question text
    pub prompt: String,
    /// Answer options, including the correct one
    pub options: Vec<String>,
    /// The correct answer (must be identical to one of the options)
    pub correct_answer: String,
}

/// The full set of questions generated for a study
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Quiz {
    /// Validate the quiz structure before it is persisted.
    ///
    /// Every question needs a prompt, at least two options, and a correct
    /// answer that matches one of the options verbatim.
    pub fn validate(&self) -> Result<()> {
        if self.questions.is_empty() {
            return Err(JobError::InvalidQuiz("quiz contains no questions".to_string()));
        }

        for (i, q) in self.questions.iter().enumerate() {
            if q.prompt.trim().is_empty() {
                return Err(JobError::InvalidQuiz(format!("question {i} has an empty prompt")));
            }
            if q.options.len() < 2 {
                return Err(JobError::InvalidQuiz(format!(
                    "question {i} has fewer than two options"
                )));
            }
            if !q.options.contains(&q.correct_answer) {
                return Err(JobError::InvalidQuiz(format!(
                    "question {i}: correct answer is not one of the options"
                )));
            }
        }

        Ok(())
    }
}

/// Result of running the AI pipeline over a study's document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyOutput {
    /// The generated study guide
    pub summary: String,
    /// The generated multiple-choice quiz
    pub quiz: Quiz,
}

/// Truncate a message on a char boundary, for persisting error text.
pub fn truncate_message(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() <= max_chars {
        msg.to_string()
    } else {
        msg.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str, options: &[&str]) -> QuizQuestion {
        QuizQuestion {
            prompt: "What is tested here?".to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_answer: correct.to_string(),
        }
    }

    #[test]
    fn test_quiz_validation_ok() {
        let quiz = Quiz {
            questions: vec![question("a", &["a", "b", "c", "d"])],
        };
        assert!(quiz.validate().is_ok());
    }

    #[test]
    fn test_quiz_validation_rejects_empty() {
        let quiz = Quiz { questions: vec![] };
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn test_quiz_validation_rejects_orphan_answer() {
        let quiz = Quiz {
            questions: vec![question("e", &["a", "b", "c", "d"])],
        };
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn test_quiz_validation_rejects_single_option() {
        let quiz = Quiz {
            questions: vec![question("a", &["a"])],
        };
        assert!(quiz.validate().is_err());
    }

    #[test]
    fn test_study_status_roundtrip() {
        for status in [StudyStatus::Processing, StudyStatus::Ready, StudyStatus::Failed] {
            assert_eq!(StudyStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(StudyStatus::parse("pronto").is_err());
    }

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short", 10), "short");
        assert_eq!(truncate_message("abcdef", 3), "abc");
        // Multi-byte chars are counted, not sliced
        assert_eq!(truncate_message("áéíóú", 3), "áéí");
    }
}
