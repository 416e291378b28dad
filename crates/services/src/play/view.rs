use quest_core::SessionState;
use quest_core::model::{ActivityId, PlayMode, Question};
use quest_core::scoring::AnswerOutcome;

/// Result of one accepted answer, as shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub question_index: usize,
    pub correct: bool,
    pub score_delta: u32,
    pub time_bonus: u32,
    pub explanation: String,
    /// Correct option text, or the model answer for subjective questions.
    pub expected_answer: String,
    pub lives_left: Option<u32>,
    pub game_over: bool,
}

impl AnswerFeedback {
    pub(crate) fn new(question_index: usize, question: &Question, outcome: AnswerOutcome) -> Self {
        let expected_answer = match question {
            Question::MultipleChoice(q) => q
                .options
                .get(q.correct_index)
                .cloned()
                .unwrap_or_default(),
            Question::Subjective(q) => q.model_answer.clone(),
        };
        Self {
            question_index,
            correct: outcome.correct,
            score_delta: outcome.score_delta,
            time_bonus: outcome.time_bonus,
            explanation: question.explanation().to_string(),
            expected_answer,
            lives_left: outcome.lives_left,
            game_over: outcome.game_over,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageView {
    pub index: usize,
    pub count: usize,
    pub title: String,
    pub lesson: Option<String>,
}

/// Snapshot of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayView {
    pub activity_id: ActivityId,
    pub title: String,
    pub mode: PlayMode,
    pub state: SessionState,
    pub question_index: usize,
    pub question_count: usize,
    pub stage: Option<StageView>,
    /// Current question while playing.
    pub question: Option<Question>,
    pub answered: bool,
    pub score: u32,
    pub lives: Option<u32>,
    pub max_lives: Option<u32>,
    pub time_left_secs: Option<u32>,
    pub feedback: Option<AnswerFeedback>,
    pub game_over_pending: bool,
}

impl PlayView {
    /// 1-based position for "question n of m" labels.
    #[must_use]
    pub fn position(&self) -> usize {
        (self.question_index + 1).min(self.question_count)
    }
}
