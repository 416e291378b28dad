mod progress;
mod session;
mod telemetry;
mod view;
mod workflow;

// Public API of the play subsystem.
pub use progress::{ProgressStore, slot_key};
pub use session::{PlaySession, ResumeOutcome};
pub use telemetry::PlayTelemetry;
pub use view::{AnswerFeedback, PlayView, StageView};
pub use workflow::PlayLoopService;
