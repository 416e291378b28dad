//! Shared error types for the services crate.

use thiserror::Error;

use quest_core::machine::TransitionError;
use quest_core::model::{ActivityError, ActivityId};
use storage::repository::StorageError;

/// Errors emitted by the play orchestrator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayError {
    #[error("content unavailable: {0}")]
    ContentUnavailable(#[from] ActivityError),
    #[error("activity {0} not found")]
    ActivityNotFound(ActivityId),
    #[error("activity {id} could not be read: {reason}")]
    MalformedActivity { id: ActivityId, reason: String },
    #[error("activity {0} is not open for play right now")]
    OutsideAvailability(ActivityId),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PlayError {
    /// True for errors that make the activity unplayable. These are not retried.
    #[must_use]
    pub fn is_content_unavailable(&self) -> bool {
        matches!(
            self,
            PlayError::ContentUnavailable(_)
                | PlayError::ActivityNotFound(_)
                | PlayError::MalformedActivity { .. }
        )
    }
}

/// Errors emitted by `HttpPlayRecorder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayRecordClientError {
    #[error("play record request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("play record response did not contain an id")]
    MissingId,
}

impl From<PlayRecordClientError> for StorageError {
    fn from(err: PlayRecordClientError) -> Self {
        match err {
            PlayRecordClientError::HttpStatus(status) if status == reqwest::StatusCode::NOT_FOUND => {
                StorageError::NotFound
            }
            PlayRecordClientError::HttpStatus(status) if status == reqwest::StatusCode::CONFLICT => {
                StorageError::Conflict
            }
            PlayRecordClientError::MissingId => {
                StorageError::Serialization(PlayRecordClientError::MissingId.to_string())
            }
            other => StorageError::Connection(other.to_string()),
        }
    }
}
