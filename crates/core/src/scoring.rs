//! Score deltas and life depletion for a single answer submission.
//!
//! Everything here is pure: the orchestrator feeds in the question, the
//! learner's input and a snapshot of the session, and applies the outcome.

use thiserror::Error;

use crate::model::{Answer, Question};

/// Base points for a correct multiple choice answer without custom points.
pub const DEFAULT_CHOICE_POINTS: u32 = 100;

/// Base points for a subjective answer without custom points.
pub const DEFAULT_SUBJECTIVE_POINTS: u32 = 50;

/// Upper bound of the time bonus.
pub const MAX_TIME_BONUS: u32 = 50;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Input the engine refuses to score.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("option {index} is out of bounds for {len} options")]
    OptionOutOfBounds { index: usize, len: usize },

    #[error("answer text cannot be empty")]
    EmptyText,

    #[error("answer kind does not match the question")]
    KindMismatch,
}

//
// ─── CONTEXT / OUTCOME ─────────────────────────────────────────────────────────
//

/// Session snapshot the scoring rules depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringContext {
    pub time_left_secs: u32,
    /// `None` when no timer runs for the session.
    pub timer_budget: Option<u32>,
    /// Current lives; `None` when lives are disabled.
    pub lives: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub score_delta: u32,
    pub time_bonus: u32,
    /// Lives after this answer; `None` when lives are disabled.
    pub lives_left: Option<u32>,
    pub game_over: bool,
}

//
// ─── RULES ─────────────────────────────────────────────────────────────────────
//

/// Bonus for answering with `time_left_secs` of `budget` remaining.
///
/// `floor(time_left / budget * 50)`, so it decays linearly as the session clock
/// runs and stays within `0..=MAX_TIME_BONUS`.
#[must_use]
pub fn time_bonus(time_left_secs: u32, budget: Option<u32>) -> u32 {
    match budget {
        Some(total) if total > 0 => {
            let left = u64::from(time_left_secs.min(total));
            let bonus = left * u64::from(MAX_TIME_BONUS) / u64::from(total);
            u32::try_from(bonus).unwrap_or(MAX_TIME_BONUS)
        }
        _ => 0,
    }
}

/// Scores one answer.
///
/// # Errors
///
/// Returns `AnswerError` for an out-of-range option, blank text, or an answer
/// kind that does not match the question.
pub fn evaluate(
    question: &Question,
    answer: &Answer,
    ctx: ScoringContext,
) -> Result<AnswerOutcome, AnswerError> {
    match (question, answer) {
        (Question::MultipleChoice(q), Answer::Choice(selected)) => {
            let len = q.options.len();
            if *selected >= len {
                return Err(AnswerError::OptionOutOfBounds {
                    index: *selected,
                    len,
                });
            }

            if *selected == q.correct_index {
                let bonus = time_bonus(ctx.time_left_secs, ctx.timer_budget);
                let base = q.points.unwrap_or(DEFAULT_CHOICE_POINTS);
                return Ok(AnswerOutcome {
                    correct: true,
                    score_delta: base.saturating_add(bonus),
                    time_bonus: bonus,
                    lives_left: ctx.lives,
                    game_over: false,
                });
            }

            let lives_left = ctx.lives.map(|lives| lives.saturating_sub(1));
            Ok(AnswerOutcome {
                correct: false,
                score_delta: 0,
                time_bonus: 0,
                lives_left,
                game_over: lives_left == Some(0),
            })
        }
        (Question::Subjective(q), Answer::Text(text)) => {
            if text.trim().is_empty() {
                return Err(AnswerError::EmptyText);
            }
            Ok(AnswerOutcome {
                correct: true,
                score_delta: q.points.unwrap_or(DEFAULT_SUBJECTIVE_POINTS),
                time_bonus: 0,
                lives_left: ctx.lives,
                game_over: false,
            })
        }
        _ => Err(AnswerError::KindMismatch),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn mc() -> Question {
        Question::multiple_choice("Largest planet?", ["Mars", "Jupiter", "Venus"], 1, "")
    }

    fn relaxed(lives: Option<u32>) -> ScoringContext {
        ScoringContext {
            time_left_secs: 0,
            timer_budget: None,
            lives,
        }
    }

    #[test]
    fn correct_choice_scores_base_points_without_timer() {
        let out = evaluate(&mc(), &Answer::Choice(1), relaxed(Some(3))).unwrap();
        assert!(out.correct);
        assert_eq!(out.score_delta, 100);
        assert_eq!(out.lives_left, Some(3));
    }

    #[test]
    fn ten_seconds_left_of_three_hundred_gives_one_bonus_point() {
        let ctx = ScoringContext {
            time_left_secs: 10,
            timer_budget: Some(300),
            lives: None,
        };
        let out = evaluate(&mc(), &Answer::Choice(1), ctx).unwrap();
        assert_eq!(out.time_bonus, 1);
        assert_eq!(out.score_delta, 101);
    }

    #[test]
    fn bonus_never_grows_as_time_elapses_and_stays_bounded() {
        let budget = 300;
        let mut previous = u32::MAX;
        for elapsed in 0..=budget {
            let bonus = time_bonus(budget - elapsed, Some(budget));
            assert!(bonus <= MAX_TIME_BONUS);
            assert!(bonus <= previous);
            previous = bonus;
        }
        assert_eq!(time_bonus(budget, Some(budget)), MAX_TIME_BONUS);
        assert_eq!(time_bonus(0, Some(budget)), 0);
        assert_eq!(time_bonus(999, Some(budget)), MAX_TIME_BONUS);
    }

    #[test]
    fn custom_points_replace_the_base() {
        let q = mc().with_points(250);
        let out = evaluate(&q, &Answer::Choice(1), relaxed(None)).unwrap();
        assert_eq!(out.score_delta, 250);
    }

    #[test]
    fn wrong_choice_costs_a_life() {
        let out = evaluate(&mc(), &Answer::Choice(0), relaxed(Some(3))).unwrap();
        assert!(!out.correct);
        assert_eq!(out.score_delta, 0);
        assert_eq!(out.lives_left, Some(2));
        assert!(!out.game_over);
    }

    #[test]
    fn losing_the_last_life_signals_game_over() {
        let out = evaluate(&mc(), &Answer::Choice(2), relaxed(Some(1))).unwrap();
        assert_eq!(out.lives_left, Some(0));
        assert!(out.game_over);
    }

    #[test]
    fn lives_never_go_negative() {
        let out = evaluate(&mc(), &Answer::Choice(0), relaxed(Some(0))).unwrap();
        assert_eq!(out.lives_left, Some(0));
    }

    #[test]
    fn wrong_choice_without_lives_is_never_game_over() {
        let out = evaluate(&mc(), &Answer::Choice(0), relaxed(None)).unwrap();
        assert_eq!(out.lives_left, None);
        assert!(!out.game_over);
    }

    #[test]
    fn subjective_answers_always_score_and_never_cost_lives() {
        let q = Question::subjective("Why is the sky blue?", "Rayleigh scattering", "");
        let ctx = ScoringContext {
            time_left_secs: 300,
            timer_budget: Some(300),
            lives: Some(1),
        };
        let out = evaluate(&q, &Answer::text("dunno"), ctx).unwrap();
        assert!(out.correct);
        assert_eq!(out.score_delta, DEFAULT_SUBJECTIVE_POINTS);
        assert_eq!(out.time_bonus, 0);
        assert_eq!(out.lives_left, Some(1));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert_eq!(
            evaluate(&mc(), &Answer::Choice(3), relaxed(None)),
            Err(AnswerError::OptionOutOfBounds { index: 3, len: 3 })
        );
        let q = Question::subjective("Explain", "model", "");
        assert_eq!(
            evaluate(&q, &Answer::text("  "), relaxed(None)),
            Err(AnswerError::EmptyText)
        );
        assert_eq!(
            evaluate(&q, &Answer::Choice(0), relaxed(None)),
            Err(AnswerError::KindMismatch)
        );
    }
}
