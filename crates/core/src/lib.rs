#![forbid(unsafe_code)]

pub mod machine;
pub mod model;
pub mod scoring;
pub mod time;
pub mod timer;

pub use machine::{SessionEvent, SessionState, TransitionError};
pub use time::Clock;
