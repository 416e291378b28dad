//! Finite-state controller for one play-through, independent of any UI.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::PlayMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Intro,
    /// Quest only: lesson shown before a stage's questions.
    Lesson,
    Playing,
    /// Quest only: a stage is done and more remain.
    StageComplete,
    QuizComplete,
    QuestComplete,
    GameOver,
    TimeExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Start a new run from the intro screen.
    Begin,
    /// Continue persisted progress from the intro screen.
    Resume,
    AcknowledgeLesson,
    StageExhausted,
    SequenceExhausted,
    LivesDepleted,
    TimerExpired,
    NextStage,
    /// Leave the run without discarding progress.
    Quit,
    Restart,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot apply {event:?} in state {from:?} ({mode:?} mode)")]
pub struct TransitionError {
    pub from: SessionState,
    pub event: SessionEvent,
    pub mode: PlayMode,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::QuizComplete
                | SessionState::QuestComplete
                | SessionState::GameOver
                | SessionState::TimeExpired
        )
    }

    /// States in which the session clock runs.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Lesson | SessionState::Playing | SessionState::StageComplete
        )
    }

    /// Terminal states that count as a completed run.
    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, SessionState::QuizComplete | SessionState::QuestComplete)
    }

    /// Applies `event` to the state.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` when the event is not valid in this state and mode.
    pub fn next(self, mode: PlayMode, event: SessionEvent) -> Result<SessionState, TransitionError> {
        use PlayMode::{Quest, Quiz};
        use SessionEvent as E;
        use SessionState as S;

        let next = match (self, event, mode) {
            (_, E::Restart, _) => S::Intro,

            (S::Intro, E::Begin, Quiz) | (S::Intro, E::Resume, _) => S::Playing,
            (S::Intro, E::Begin, Quest) => S::Lesson,

            (S::Lesson, E::AcknowledgeLesson, Quest) => S::Playing,

            (S::Playing, E::StageExhausted, Quest) => S::StageComplete,
            (S::Playing, E::SequenceExhausted, Quiz) => S::QuizComplete,
            (S::Playing, E::SequenceExhausted, Quest) => S::QuestComplete,
            (S::Playing, E::LivesDepleted, _) => S::GameOver,

            (S::Playing, E::TimerExpired, Quiz) => S::TimeExpired,
            (S::Lesson | S::Playing | S::StageComplete, E::TimerExpired, Quest) => S::GameOver,

            (S::StageComplete, E::NextStage, Quest) => S::Lesson,

            (S::Lesson | S::Playing | S::StageComplete, E::Quit, _) => S::Intro,

            _ => {
                return Err(TransitionError {
                    from: self,
                    event,
                    mode,
                });
            }
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::{SessionEvent as E, SessionState as S, TransitionError};
    use crate::model::PlayMode::{self, Quest, Quiz};

    fn run(mode: PlayMode, events: &[E]) -> Result<S, TransitionError> {
        events
            .iter()
            .try_fold(S::Intro, |state, event| state.next(mode, *event))
    }

    #[test]
    fn quiz_runs_straight_to_completion() {
        assert_eq!(run(Quiz, &[E::Begin, E::SequenceExhausted]), Ok(S::QuizComplete));
    }

    #[test]
    fn quest_walks_lessons_and_stages() {
        let end = run(
            Quest,
            &[
                E::Begin,
                E::AcknowledgeLesson,
                E::StageExhausted,
                E::NextStage,
                E::AcknowledgeLesson,
                E::SequenceExhausted,
            ],
        );
        assert_eq!(end, Ok(S::QuestComplete));
    }

    #[test]
    fn timeout_differs_between_modes() {
        assert_eq!(run(Quiz, &[E::Begin, E::TimerExpired]), Ok(S::TimeExpired));
        assert_eq!(run(Quest, &[E::Begin, E::TimerExpired]), Ok(S::GameOver));
        assert_eq!(
            run(Quest, &[E::Begin, E::AcknowledgeLesson, E::TimerExpired]),
            Ok(S::GameOver)
        );
    }

    #[test]
    fn lives_depleted_ends_the_game() {
        assert_eq!(run(Quiz, &[E::Begin, E::LivesDepleted]), Ok(S::GameOver));
    }

    #[test]
    fn resume_jumps_straight_into_play() {
        assert_eq!(run(Quest, &[E::Resume]), Ok(S::Playing));
    }

    #[test]
    fn quit_returns_to_intro_and_restart_works_anywhere() {
        assert_eq!(run(Quiz, &[E::Begin, E::Quit]), Ok(S::Intro));
        for terminal in [S::QuizComplete, S::QuestComplete, S::GameOver, S::TimeExpired] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.next(Quiz, E::Restart), Ok(S::Intro));
        }
    }

    #[test]
    fn quest_only_transitions_are_rejected_in_quiz_mode() {
        let err = S::Playing.next(Quiz, E::StageExhausted).unwrap_err();
        assert_eq!(err.from, S::Playing);
        assert_eq!(err.event, E::StageExhausted);
        assert!(S::Intro.next(Quiz, E::AcknowledgeLesson).is_err());
    }

    #[test]
    fn terminal_states_ignore_gameplay_events() {
        assert!(S::GameOver.next(Quiz, E::TimerExpired).is_err());
        assert!(S::QuizComplete.next(Quiz, E::Quit).is_err());
        assert!(S::TimeExpired.next(Quiz, E::Begin).is_err());
    }
}
