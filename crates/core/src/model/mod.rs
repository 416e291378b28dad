mod activity;
mod ids;
mod progress;
mod question;
mod theme;

pub use activity::{
    Activity, ActivityContent, ActivityError, AvailabilityWindow, PlayMode, QuestionSequence,
    SessionRules, Stage, StageSpan,
};
pub use ids::{ActivityId, ParseIdError, PlayRecordId};
pub use progress::SessionProgress;
pub use question::{Answer, MultipleChoiceQuestion, Question, QuestionError, SubjectiveQuestion};
pub use theme::{DEFAULT_MAX_LIVES, DEFAULT_TIMER_SECONDS, ThemeConfig, ThemeConfigDraft, ThemeError};
