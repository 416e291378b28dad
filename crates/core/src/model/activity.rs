use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ActivityId;
use crate::model::question::{Question, QuestionError};
use crate::model::theme::ThemeConfig;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons an activity cannot be played.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActivityError {
    #[error("activity has no questions")]
    NoQuestions,

    #[error("stage {stage} has no questions")]
    EmptyStage { stage: usize },

    #[error("question {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

//
// ─── ACTIVITY ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayMode {
    Quiz,
    Quest,
}

/// A quest stage: a lesson shown first, then its questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub title: String,
    #[serde(default)]
    pub lesson: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ActivityContent {
    Quiz { questions: Vec<Question> },
    Quest { stages: Vec<Stage> },
}

/// Optional window outside of which an activity cannot be played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opens_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closes_at: Option<DateTime<Utc>>,
}

impl AvailabilityWindow {
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let opened = self.opens_at.is_none_or(|at| now >= at);
        let not_closed = self.closes_at.is_none_or(|at| now < at);
        opened && not_closed
    }
}

/// Content payload handed to the engine by the activity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: ActivityId,
    pub title: String,
    #[serde(flatten)]
    pub content: ActivityContent,
    #[serde(default)]
    pub theme: ThemeConfig,
    /// Session budget that replaces the theme timer when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityWindow>,
}

impl Activity {
    #[must_use]
    pub fn quiz(id: ActivityId, title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id,
            title: title.into(),
            content: ActivityContent::Quiz { questions },
            theme: ThemeConfig::default(),
            time_limit_secs: None,
            availability: None,
        }
    }

    #[must_use]
    pub fn quest(id: ActivityId, title: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            id,
            title: title.into(),
            content: ActivityContent::Quest { stages },
            theme: ThemeConfig::default(),
            time_limit_secs: None,
            availability: None,
        }
    }

    #[must_use]
    pub fn with_theme(mut self, theme: ThemeConfig) -> Self {
        self.theme = theme;
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_availability(mut self, window: AvailabilityWindow) -> Self {
        self.availability = Some(window);
        self
    }

    #[must_use]
    pub fn mode(&self) -> PlayMode {
        match self.content {
            ActivityContent::Quiz { .. } => PlayMode::Quiz,
            ActivityContent::Quest { .. } => PlayMode::Quest,
        }
    }

    #[must_use]
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.availability.is_none_or(|window| window.contains(now))
    }

    /// Gameplay rules for a session of this activity.
    #[must_use]
    pub fn rules(&self) -> SessionRules {
        let timer_budget = self
            .time_limit_secs
            .filter(|secs| *secs > 0)
            .or_else(|| {
                self.theme
                    .timer_enabled()
                    .then_some(self.theme.timer_seconds())
            });
        let max_lives = self
            .theme
            .lives_enabled()
            .then_some(self.theme.max_lives());

        SessionRules {
            mode: self.mode(),
            timer_budget,
            max_lives,
        }
    }

    /// Flattens the activity into a single ordered question sequence.
    ///
    /// # Errors
    ///
    /// Returns `ActivityError` if there are no questions, a stage is empty, or
    /// a question breaks its invariants.
    pub fn sequence(&self) -> Result<QuestionSequence, ActivityError> {
        let (questions, stages) = match &self.content {
            ActivityContent::Quiz { questions } => {
                let span = StageSpan {
                    title: self.title.clone(),
                    lesson: None,
                    start: 0,
                    len: questions.len(),
                };
                (questions.clone(), vec![span])
            }
            ActivityContent::Quest { stages } => {
                let mut flat = Vec::new();
                let mut spans = Vec::with_capacity(stages.len());
                for (stage_index, stage) in stages.iter().enumerate() {
                    if stage.questions.is_empty() {
                        return Err(ActivityError::EmptyStage { stage: stage_index });
                    }
                    spans.push(StageSpan {
                        title: stage.title.clone(),
                        lesson: Some(stage.lesson.clone()),
                        start: flat.len(),
                        len: stage.questions.len(),
                    });
                    flat.extend(stage.questions.iter().cloned());
                }
                (flat, spans)
            }
        };

        if questions.is_empty() {
            return Err(ActivityError::NoQuestions);
        }
        for (index, question) in questions.iter().enumerate() {
            question
                .validate()
                .map_err(|source| ActivityError::InvalidQuestion { index, source })?;
        }

        Ok(QuestionSequence {
            mode: self.mode(),
            questions,
            stages,
        })
    }
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Effective gameplay rules derived from an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRules {
    pub mode: PlayMode,
    /// Whole-session countdown budget in seconds; `None` when no timer runs.
    pub timer_budget: Option<u32>,
    /// Starting lives; `None` when lives are disabled.
    pub max_lives: Option<u32>,
}

//
// ─── SEQUENCE ──────────────────────────────────────────────────────────────────
//

/// Stage boundary inside a flattened sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpan {
    pub title: String,
    pub lesson: Option<String>,
    pub start: usize,
    pub len: usize,
}

impl StageSpan {
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end()
    }
}

/// Questions in play order plus the stage boundaries between them.
///
/// A quiz is a single stage without a lesson, so the engine never needs to
/// branch on the activity shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSequence {
    mode: PlayMode,
    questions: Vec<Question>,
    stages: Vec<StageSpan>,
}

impl QuestionSequence {
    #[must_use]
    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn stages(&self) -> &[StageSpan] {
        &self.stages
    }

    #[must_use]
    pub fn stage_index_of(&self, question_index: usize) -> Option<usize> {
        self.stages
            .iter()
            .position(|span| span.contains(question_index))
    }

    #[must_use]
    pub fn stage_of(&self, question_index: usize) -> Option<&StageSpan> {
        self.stage_index_of(question_index)
            .and_then(|i| self.stages.get(i))
    }

    #[must_use]
    pub fn is_last(&self, question_index: usize) -> bool {
        question_index + 1 == self.questions.len()
    }

    /// True when `question_index` is the final question of its stage.
    #[must_use]
    pub fn is_stage_end(&self, question_index: usize) -> bool {
        self.stage_of(question_index)
            .is_some_and(|span| question_index + 1 == span.end())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn mc(n: usize) -> Question {
        Question::multiple_choice(format!("Q{n}"), ["a", "b", "c"], 0, "")
    }

    fn two_stage_quest() -> Activity {
        Activity::quest(
            ActivityId::new(7),
            "Planets",
            vec![
                Stage {
                    title: "Inner".into(),
                    lesson: "Rocky planets".into(),
                    questions: vec![mc(1), mc(2)],
                },
                Stage {
                    title: "Outer".into(),
                    lesson: "Gas giants".into(),
                    questions: vec![mc(3), mc(4)],
                },
            ],
        )
    }

    #[test]
    fn quiz_flattens_into_one_implicit_stage() {
        let quiz = Activity::quiz(ActivityId::new(1), "Basics", vec![mc(1), mc(2), mc(3)]);
        let seq = quiz.sequence().unwrap();
        assert_eq!(seq.mode(), PlayMode::Quiz);
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.stages().len(), 1);
        assert!(seq.stages()[0].lesson.is_none());
        assert!(!seq.is_stage_end(1));
        assert!(seq.is_stage_end(2));
        assert!(seq.is_last(2));
    }

    #[test]
    fn quest_flattens_with_stage_boundaries() {
        let seq = two_stage_quest().sequence().unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.stage_index_of(0), Some(0));
        assert_eq!(seq.stage_index_of(2), Some(1));
        assert!(seq.is_stage_end(1));
        assert!(!seq.is_last(1));
        assert_eq!(seq.get(2).map(Question::prompt), Some("Q3"));
        assert_eq!(seq.stage_of(3).unwrap().lesson.as_deref(), Some("Gas giants"));
    }

    #[test]
    fn empty_quiz_is_unplayable() {
        let quiz = Activity::quiz(ActivityId::new(1), "Empty", Vec::new());
        assert_eq!(quiz.sequence(), Err(ActivityError::NoQuestions));
    }

    #[test]
    fn empty_stage_is_unplayable() {
        let mut quest = two_stage_quest();
        if let ActivityContent::Quest { stages } = &mut quest.content {
            stages[1].questions.clear();
        }
        assert_eq!(quest.sequence(), Err(ActivityError::EmptyStage { stage: 1 }));
    }

    #[test]
    fn invalid_question_reports_its_flat_index() {
        let bad = Question::multiple_choice("Broken", ["a", "b"], 5, "");
        let quiz = Activity::quiz(ActivityId::new(1), "Bad", vec![mc(1), bad]);
        let err = quiz.sequence().unwrap_err();
        assert!(matches!(err, ActivityError::InvalidQuestion { index: 1, .. }));
    }

    #[test]
    fn time_limit_overrides_theme_timer() {
        let theme = ThemeConfig::new(true, 300, true, 2).unwrap();
        let quiz = Activity::quiz(ActivityId::new(1), "Q", vec![mc(1)]).with_theme(theme);
        assert_eq!(quiz.rules().timer_budget, Some(300));
        assert_eq!(quiz.rules().max_lives, Some(2));

        let limited = quiz.with_time_limit(120);
        assert_eq!(limited.rules().timer_budget, Some(120));
    }

    #[test]
    fn relaxed_theme_has_no_timer_or_lives() {
        let quiz =
            Activity::quiz(ActivityId::new(1), "Q", vec![mc(1)]).with_theme(ThemeConfig::relaxed());
        let rules = quiz.rules();
        assert_eq!(rules.timer_budget, None);
        assert_eq!(rules.max_lives, None);
    }

    #[test]
    fn availability_window_is_half_open() {
        let now = fixed_now();
        let window = AvailabilityWindow {
            opens_at: Some(now),
            closes_at: Some(now + Duration::hours(1)),
        };
        assert!(window.contains(now));
        assert!(!window.contains(now - Duration::seconds(1)));
        assert!(!window.contains(now + Duration::hours(1)));
    }

    #[test]
    fn activity_json_uses_mode_tag() {
        let json = r#"{
            "id": 3,
            "title": "Cells",
            "mode": "quest",
            "stages": [{"title": "Intro", "lesson": "Cells are small",
                        "questions": [{"type": "subjective", "question": "What is a cell?",
                                       "model_answer": "The unit of life"}]}],
            "theme": {"timerEnabled": true, "timerSeconds": 60}
        }"#;
        let activity: Activity = serde_json::from_str(json).unwrap();
        assert_eq!(activity.mode(), PlayMode::Quest);
        assert_eq!(activity.rules().timer_budget, Some(60));
        assert_eq!(activity.sequence().unwrap().len(), 1);
    }
}
