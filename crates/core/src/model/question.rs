use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyPrompt,

    #[error("multiple choice needs at least 2 options, got {len}")]
    TooFewOptions { len: usize },

    #[error("correct option {index} is out of bounds for {len} options")]
    CorrectIndexOutOfBounds { index: usize, len: usize },
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

/// A single question of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    MultipleChoice(MultipleChoiceQuestion),
    Subjective(SubjectiveQuestion),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoiceQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

/// Free-text question. There is no automated grading; any non-empty answer counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectiveQuestion {
    pub question: String,
    pub model_answer: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
}

impl Question {
    /// Convenience constructor for a multiple choice question without custom points.
    #[must_use]
    pub fn multiple_choice<S: Into<String>>(
        question: impl Into<String>,
        options: impl IntoIterator<Item = S>,
        correct_index: usize,
        explanation: impl Into<String>,
    ) -> Self {
        Self::MultipleChoice(MultipleChoiceQuestion {
            question: question.into(),
            options: options.into_iter().map(Into::into).collect(),
            correct_index,
            explanation: explanation.into(),
            points: None,
        })
    }

    #[must_use]
    pub fn subjective(
        question: impl Into<String>,
        model_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self::Subjective(SubjectiveQuestion {
            question: question.into(),
            model_answer: model_answer.into(),
            explanation: explanation.into(),
            points: None,
        })
    }

    /// Overrides the point value of the question.
    #[must_use]
    pub fn with_points(mut self, value: u32) -> Self {
        match &mut self {
            Question::MultipleChoice(q) => q.points = Some(value),
            Question::Subjective(q) => q.points = Some(value),
        }
        self
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        match self {
            Question::MultipleChoice(q) => &q.question,
            Question::Subjective(q) => &q.question,
        }
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        match self {
            Question::MultipleChoice(q) => &q.explanation,
            Question::Subjective(q) => &q.explanation,
        }
    }

    #[must_use]
    pub fn points(&self) -> Option<u32> {
        match self {
            Question::MultipleChoice(q) => q.points,
            Question::Subjective(q) => q.points,
        }
    }

    /// Checks the structural invariants of the question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` for blank text, fewer than two options, or a
    /// correct index outside the option list.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt().trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if let Question::MultipleChoice(q) = self {
            let len = q.options.len();
            if len < 2 {
                return Err(QuestionError::TooFewOptions { len });
            }
            if q.correct_index >= len {
                return Err(QuestionError::CorrectIndexOutOfBounds {
                    index: q.correct_index,
                    len,
                });
            }
        }
        Ok(())
    }
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// What the learner submitted for a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(usize),
    Text(String),
}

impl Answer {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
