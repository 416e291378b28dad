use quest_core::Clock;
use quest_core::machine::{SessionEvent, SessionState};
use quest_core::model::{Activity, Answer, PlayMode, QuestionSequence, SessionProgress, SessionRules};
use quest_core::scoring::{self, ScoringContext};
use quest_core::timer::{Countdown, Tick};
use storage::repository::PlayRecordUpdate;

use super::progress::ProgressStore;
use super::telemetry::{PlayTelemetry, RecordSlot};
use super::view::{AnswerFeedback, PlayView, StageView};
use crate::error::PlayError;

/// How `PlaySession::resume` got the session going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Saved progress was restored.
    Resumed,
    /// Nothing usable was saved, so a new run was started instead.
    StartedFresh,
}

/// One play-through of an activity.
///
/// Input events and countdown ticks are applied one at a time through
/// `&mut self`. Progress is written after every change; a failed write is
/// logged and play goes on with the in-memory state.
pub struct PlaySession {
    activity: Activity,
    sequence: QuestionSequence,
    rules: SessionRules,
    clock: Clock,
    store: ProgressStore,
    telemetry: PlayTelemetry,
    state: SessionState,
    progress: SessionProgress,
    countdown: Countdown,
    record: RecordSlot,
    feedback: Option<AnswerFeedback>,
    pending_game_over: bool,
}

impl PlaySession {
    /// Build a session in the intro state.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::ContentUnavailable` when the activity has no
    /// playable question sequence.
    pub fn new(
        activity: Activity,
        clock: Clock,
        store: ProgressStore,
        telemetry: PlayTelemetry,
    ) -> Result<Self, PlayError> {
        let sequence = activity.sequence()?;
        let rules = activity.rules();
        let progress = SessionProgress::fresh(&activity, clock.now());
        Ok(Self {
            countdown: Countdown::new(rules.timer_budget),
            activity,
            sequence,
            rules,
            clock,
            store,
            telemetry,
            state: SessionState::Intro,
            progress,
            record: RecordSlot::Unknown,
            feedback: None,
            pending_game_over: false,
        })
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn mode(&self) -> PlayMode {
        self.rules.mode
    }

    #[must_use]
    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    #[must_use]
    pub fn rules(&self) -> SessionRules {
        self.rules
    }

    #[must_use]
    pub fn progress(&self) -> &SessionProgress {
        &self.progress
    }

    #[must_use]
    pub fn feedback(&self) -> Option<&AnswerFeedback> {
        self.feedback.as_ref()
    }

    /// The last life was lost; `advance` will end the game.
    #[must_use]
    pub fn is_game_over_pending(&self) -> bool {
        self.pending_game_over
    }

    /// True when `resume` would restore saved progress rather than start over.
    pub async fn has_resumable_progress(&self) -> bool {
        match self.store.load_resumable(self.activity.id).await {
            Ok(saved) => {
                saved.is_some_and(|progress| progress.fits(self.sequence.len(), &self.rules))
            }
            Err(err) => {
                tracing::warn!(activity = %self.activity.id, error = %err, "failed to read saved progress");
                false
            }
        }
    }

    /// Begin a new run, discarding any saved progress.
    ///
    /// Works from any state: a finished or running session is taken back to
    /// the intro first, so score, lives and the countdown always start fresh.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::OutsideAvailability` outside the activity's window.
    pub async fn start(&mut self) -> Result<SessionState, PlayError> {
        let now = self.clock.now();
        self.ensure_available(now)?;
        let from = match self.state {
            SessionState::Intro => SessionState::Intro,
            state => state.next(self.mode(), SessionEvent::Restart)?,
        };
        let next = from.next(self.mode(), SessionEvent::Begin)?;

        self.clear_saved().await;
        self.reset(now);
        self.record = self.telemetry.play_started(self.activity.id);
        self.state = next;
        tracing::info!(activity = %self.activity.id, mode = ?self.mode(), "session started");

        self.persist().await;
        Ok(self.state)
    }

    /// Continue from saved progress, or start over when there is nothing
    /// usable to continue.
    ///
    /// # Errors
    ///
    /// Same as [`PlaySession::start`].
    pub async fn resume(&mut self) -> Result<ResumeOutcome, PlayError> {
        self.ensure_available(self.clock.now())?;
        let next = self.state.next(self.mode(), SessionEvent::Resume)?;

        let saved = match self.store.load_resumable(self.activity.id).await {
            Ok(saved) => saved,
            Err(err) => {
                tracing::warn!(activity = %self.activity.id, error = %err, "failed to read saved progress");
                None
            }
        };
        let usable = saved.filter(|progress| {
            let fits = progress.fits(self.sequence.len(), &self.rules);
            if !fits {
                tracing::debug!(activity = %self.activity.id, "saved progress does not match the activity");
            }
            fits
        });
        let Some(progress) = usable else {
            self.start().await?;
            return Ok(ResumeOutcome::StartedFresh);
        };

        self.countdown = Countdown::resume(self.rules.timer_budget, progress.time_left_secs);
        self.record = match progress.play_record_id {
            Some(id) => RecordSlot::Known(id),
            None => std::mem::take(&mut self.record),
        };
        self.pending_game_over = self.rules.max_lives.is_some() && progress.lives == 0;
        if self.pending_game_over {
            self.countdown.stop();
        }
        self.feedback = None;
        self.progress = progress;
        self.state = next;
        tracing::info!(
            activity = %self.activity.id,
            question = self.progress.current_question_index,
            score = self.progress.score,
            "session resumed"
        );

        self.persist().await;
        Ok(ResumeOutcome::Resumed)
    }

    /// Forget saved progress without touching the running session.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Storage` if the slot cannot be removed.
    pub async fn discard_progress(&mut self) -> Result<(), PlayError> {
        self.store.clear(self.activity.id).await?;
        Ok(())
    }

    /// Submit an answer for the current question.
    ///
    /// Returns `None` and changes nothing when the session is not playing,
    /// the question already has an answer, or the input does not fit the
    /// question.
    pub async fn answer(&mut self, input: Answer) -> Option<AnswerFeedback> {
        if self.state != SessionState::Playing || self.pending_game_over {
            tracing::debug!(state = ?self.state, "answer ignored: not accepting answers");
            return None;
        }
        let index = self.progress.current_question_index;
        if self.progress.is_answered(index) {
            tracing::debug!(question = index, "answer ignored: already answered");
            return None;
        }
        let question = self.sequence.get(index)?;

        let ctx = ScoringContext {
            time_left_secs: self.progress.time_left_secs,
            timer_budget: self.rules.timer_budget,
            lives: self.rules.max_lives.map(|_| self.progress.lives),
        };
        let outcome = match scoring::evaluate(question, &input, ctx) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(question = index, error = %err, "answer ignored: invalid input");
                return None;
            }
        };
        let feedback = AnswerFeedback::new(index, question, outcome);

        self.progress.score = self.progress.score.saturating_add(outcome.score_delta);
        if let Some(lives) = outcome.lives_left {
            self.progress.lives = lives;
        }
        self.progress.answers.insert(index, input);
        if outcome.game_over {
            self.pending_game_over = true;
            self.countdown.stop();
        }
        self.feedback = Some(feedback.clone());

        self.persist().await;
        Some(feedback)
    }

    /// Move on after an answered question or a finished stage.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Transition` if the state machine rejects the step.
    pub async fn advance(&mut self) -> Result<SessionState, PlayError> {
        let index = self.progress.current_question_index;
        match self.state {
            SessionState::StageComplete => {
                self.state = self.state.next(self.mode(), SessionEvent::NextStage)?;
                self.progress.current_question_index = index + 1;
                self.feedback = None;
                self.persist().await;
            }
            SessionState::Playing if self.pending_game_over => {
                self.end_with(SessionEvent::LivesDepleted).await?;
            }
            SessionState::Playing if self.progress.is_answered(index) => {
                if self.sequence.is_last(index) {
                    self.finish().await?;
                } else if self.sequence.is_stage_end(index) {
                    self.state = self.state.next(self.mode(), SessionEvent::StageExhausted)?;
                    self.persist().await;
                } else {
                    self.progress.current_question_index = index + 1;
                    self.feedback = None;
                    self.persist().await;
                }
            }
            _ => tracing::debug!(state = ?self.state, question = index, "advance ignored"),
        }
        Ok(self.state)
    }

    /// Leave the lesson screen and show the stage's questions.
    pub fn acknowledge_lesson(&mut self) -> SessionState {
        match self.state.next(self.mode(), SessionEvent::AcknowledgeLesson) {
            Ok(next) => self.state = next,
            Err(err) => tracing::debug!(error = %err, "lesson acknowledgement ignored"),
        }
        self.state
    }

    /// Apply one second of the shared countdown.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Transition` if expiry cannot be applied.
    pub async fn tick(&mut self) -> Result<SessionState, PlayError> {
        if !self.state.is_active() || self.pending_game_over {
            return Ok(self.state);
        }
        match self.countdown.tick() {
            Tick::Running { remaining } => {
                self.progress.time_left_secs = remaining;
                self.persist().await;
            }
            Tick::Expired => {
                self.progress.time_left_secs = 0;
                let index = self.progress.current_question_index;
                if self.state == SessionState::Playing
                    && self.sequence.is_last(index)
                    && self.progress.is_answered(index)
                {
                    tracing::info!(activity = %self.activity.id, "time ran out after the last answer");
                    self.end_with(SessionEvent::SequenceExhausted).await?;
                } else {
                    tracing::info!(activity = %self.activity.id, "session time ran out");
                    self.end_with(SessionEvent::TimerExpired).await?;
                }
            }
            Tick::Idle => {}
        }
        Ok(self.state)
    }

    /// Return to the intro, keeping saved progress for a later `resume`.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Transition` unless a run is in progress.
    pub async fn quit(&mut self) -> Result<SessionState, PlayError> {
        let next = self.state.next(self.mode(), SessionEvent::Quit)?;
        self.persist().await;
        self.state = next;
        self.feedback = None;
        tracing::info!(activity = %self.activity.id, "session left for later");
        Ok(self.state)
    }

    /// Complete the run: saved progress goes away and the play record is
    /// closed as completed.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Transition` unless the session is playing.
    pub async fn finish(&mut self) -> Result<SessionState, PlayError> {
        self.end_with(SessionEvent::SequenceExhausted).await
    }

    /// Back to the intro with fresh defaults and no saved progress.
    ///
    /// # Errors
    ///
    /// Returns `PlayError::Transition` if the state machine rejects the restart.
    pub async fn restart(&mut self) -> Result<SessionState, PlayError> {
        self.state = self.state.next(self.mode(), SessionEvent::Restart)?;
        self.clear_saved().await;
        self.reset(self.clock.now());
        tracing::info!(activity = %self.activity.id, "session restarted");
        Ok(self.state)
    }

    #[must_use]
    pub fn view(&self) -> PlayView {
        let index = self.progress.current_question_index;
        let stages = self.sequence.stages();
        let stage = match self.mode() {
            PlayMode::Quiz => None,
            PlayMode::Quest => self.sequence.stage_index_of(index).and_then(|i| {
                stages.get(i).map(|span| StageView {
                    index: i,
                    count: stages.len(),
                    title: span.title.clone(),
                    lesson: span.lesson.clone(),
                })
            }),
        };
        let question = (self.state == SessionState::Playing)
            .then(|| self.sequence.get(index).cloned())
            .flatten();

        PlayView {
            activity_id: self.activity.id,
            title: self.activity.title.clone(),
            mode: self.mode(),
            state: self.state,
            question_index: index,
            question_count: self.sequence.len(),
            stage,
            question,
            answered: self.progress.is_answered(index),
            score: self.progress.score,
            lives: self.rules.max_lives.map(|_| self.progress.lives),
            max_lives: self.rules.max_lives,
            time_left_secs: self.rules.timer_budget.map(|_| self.progress.time_left_secs),
            feedback: self.feedback.clone(),
            game_over_pending: self.pending_game_over,
        }
    }

    fn ensure_available(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), PlayError> {
        if self.activity.is_available_at(now) {
            Ok(())
        } else {
            Err(PlayError::OutsideAvailability(self.activity.id))
        }
    }

    fn reset(&mut self, now: chrono::DateTime<chrono::Utc>) {
        self.progress = SessionProgress::fresh(&self.activity, now);
        self.countdown = Countdown::new(self.rules.timer_budget);
        self.record = RecordSlot::Unknown;
        self.feedback = None;
        self.pending_game_over = false;
    }

    async fn end_with(&mut self, event: SessionEvent) -> Result<SessionState, PlayError> {
        let next = self.state.next(self.mode(), event)?;
        self.state = next;
        self.countdown.stop();
        self.pending_game_over = false;
        self.clear_saved().await;

        let update = PlayRecordUpdate {
            score: self.progress.score,
            completed: next.is_completed(),
            duration_secs: self.clock.elapsed_secs(self.progress.started_at),
        };
        let record = std::mem::take(&mut self.record);
        self.telemetry.play_finished(record, update);

        tracing::info!(
            activity = %self.activity.id,
            state = ?next,
            score = self.progress.score,
            "session ended"
        );
        Ok(next)
    }

    async fn persist(&mut self) {
        if let Some(id) = self.record.poll() {
            self.progress.play_record_id = Some(id);
        }
        self.progress.timestamp = self.clock.now();
        if let Err(err) = self.store.save(&self.progress).await {
            tracing::warn!(activity = %self.activity.id, error = %err, "failed to save progress");
        }
    }

    async fn clear_saved(&self) {
        if let Err(err) = self.store.clear(self.activity.id).await {
            tracing::warn!(activity = %self.activity.id, error = %err, "failed to clear saved progress");
        }
    }
}
