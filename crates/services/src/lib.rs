#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod play;
pub mod record_client;
pub mod timer;

pub use quest_core::Clock;

pub use config::PlayConfig;
pub use error::{PlayError, PlayRecordClientError};
pub use play::{
    AnswerFeedback, PlayLoopService, PlaySession, PlayTelemetry, PlayView, ProgressStore,
    ResumeOutcome,
};
pub use record_client::{HttpPlayRecorder, PlayRecordConfig};
pub use timer::TimerDriver;
