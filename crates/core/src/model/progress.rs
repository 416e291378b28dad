use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::activity::{Activity, AvailabilityWindow, SessionRules};
use crate::model::ids::{ActivityId, PlayRecordId};
use crate::model::question::Answer;

/// Mutable state of an in-flight play session.
///
/// This is the document persisted in the progress slot for `activity_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub activity_id: ActivityId,
    pub current_question_index: usize,
    pub score: u32,
    pub lives: u32,
    pub time_left_secs: u32,
    pub answers: BTreeMap<usize, Answer>,
    pub started_at: DateTime<Utc>,
    /// Last time the progress was persisted; drives expiry.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_record_id: Option<PlayRecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityWindow>,
}

impl SessionProgress {
    /// Fresh progress with full lives and a full timer.
    #[must_use]
    pub fn fresh(activity: &Activity, now: DateTime<Utc>) -> Self {
        let rules = activity.rules();
        Self {
            activity_id: activity.id,
            current_question_index: 0,
            score: 0,
            lives: rules.max_lives.unwrap_or(0),
            time_left_secs: rules.timer_budget.unwrap_or(0),
            answers: BTreeMap::new(),
            started_at: now,
            timestamp: now,
            play_record_id: None,
            time_limit_secs: activity.time_limit_secs,
            availability: activity.availability,
        }
    }

    #[must_use]
    pub fn is_answered(&self, question_index: usize) -> bool {
        self.answers.contains_key(&question_index)
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// True when the progress is older than `ttl` at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.timestamp > ttl
    }

    /// Checks that persisted progress can still drive a session with these rules.
    ///
    /// Progress written for a different shape of the activity, or with no time
    /// left on a running timer, cannot be resumed.
    #[must_use]
    pub fn fits(&self, question_count: usize, rules: &SessionRules) -> bool {
        if self.current_question_index >= question_count {
            return false;
        }
        if self.answers.keys().any(|index| *index >= question_count) {
            return false;
        }
        if let Some(max) = rules.max_lives {
            if self.lives > max {
                return false;
            }
        }
        match rules.timer_budget {
            Some(budget) => self.time_left_secs > 0 && self.time_left_secs <= budget,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::Question;
    use crate::model::theme::ThemeConfig;
    use crate::time::fixed_now;

    fn activity() -> Activity {
        Activity::quiz(
            ActivityId::new(9),
            "Quiz",
            vec![
                Question::multiple_choice("Q1", ["a", "b"], 0, ""),
                Question::subjective("Q2", "model", ""),
            ],
        )
        .with_theme(ThemeConfig::new(true, 120, true, 3).unwrap())
    }

    #[test]
    fn fresh_progress_starts_full() {
        let p = SessionProgress::fresh(&activity(), fixed_now());
        assert_eq!(p.score, 0);
        assert_eq!(p.lives, 3);
        assert_eq!(p.time_left_secs, 120);
        assert_eq!(p.current_question_index, 0);
        assert!(p.answers.is_empty());
    }

    #[test]
    fn expiry_is_strictly_after_ttl() {
        let p = SessionProgress::fresh(&activity(), fixed_now());
        let ttl = Duration::hours(24);
        assert!(!p.is_expired_at(fixed_now() + ttl, ttl));
        assert!(p.is_expired_at(fixed_now() + Duration::hours(25), ttl));
    }

    #[test]
    fn json_document_round_trips_field_for_field() {
        let mut p = SessionProgress::fresh(&activity(), fixed_now());
        p.current_question_index = 1;
        p.score = 149;
        p.lives = 2;
        p.answers.insert(0, Answer::Choice(1));
        p.answers.insert(1, Answer::text("my answer"));
        p.play_record_id = Some(PlayRecordId::generate());

        let json = serde_json::to_string(&p).unwrap();
        let back: SessionProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn progress_must_fit_the_activity() {
        let a = activity();
        let rules = a.rules();
        let mut p = SessionProgress::fresh(&a, fixed_now());
        assert!(p.fits(2, &rules));

        p.current_question_index = 2;
        assert!(!p.fits(2, &rules));

        p.current_question_index = 0;
        p.time_left_secs = 0;
        assert!(!p.fits(2, &rules));

        p.time_left_secs = 60;
        p.lives = 4;
        assert!(!p.fits(2, &rules));
    }
}
