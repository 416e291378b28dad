use std::sync::Arc;

use quest_core::Clock;
use quest_core::model::{Activity, ActivityId};
use storage::repository::{
    ActivityRepository, KeyValueStore, PlayCountRepository, PlayRecordRepository, Storage,
    StorageError,
};

use super::progress::ProgressStore;
use super::session::PlaySession;
use super::telemetry::PlayTelemetry;
use crate::config::PlayConfig;
use crate::error::PlayError;

/// Opens play sessions for stored activities.
#[derive(Clone)]
pub struct PlayLoopService {
    clock: Clock,
    activities: Arc<dyn ActivityRepository>,
    progress: ProgressStore,
    telemetry: PlayTelemetry,
}

impl PlayLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        activities: Arc<dyn ActivityRepository>,
        progress_slots: Arc<dyn KeyValueStore>,
        play_records: Arc<dyn PlayRecordRepository>,
        play_counts: Arc<dyn PlayCountRepository>,
        config: &PlayConfig,
    ) -> Self {
        Self {
            clock,
            activities,
            progress: ProgressStore::new(progress_slots, clock, config.progress_ttl),
            telemetry: PlayTelemetry::new(play_records, play_counts),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage, config: &PlayConfig) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.activities),
            Arc::clone(&storage.progress_slots),
            Arc::clone(&storage.play_records),
            Arc::clone(&storage.play_counts),
            config,
        )
    }

    /// Report plays somewhere other than the storage the service was built on.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: PlayTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    #[must_use]
    pub fn progress_store(&self) -> &ProgressStore {
        &self.progress
    }

    /// Load an activity and prepare a session at its intro screen.
    ///
    /// # Errors
    ///
    /// Returns a content-unavailable `PlayError` when the activity is missing,
    /// unreadable or has nothing to play, and `PlayError::Storage` for other
    /// storage failures.
    pub async fn open(&self, activity_id: ActivityId) -> Result<PlaySession, PlayError> {
        let activity = match self.activities.get_activity(activity_id).await {
            Ok(activity) => activity,
            Err(StorageError::NotFound) => return Err(PlayError::ActivityNotFound(activity_id)),
            Err(StorageError::Serialization(reason)) => {
                return Err(PlayError::MalformedActivity {
                    id: activity_id,
                    reason,
                });
            }
            Err(err) => return Err(err.into()),
        };

        let session = PlaySession::new(
            activity,
            self.clock,
            self.progress.clone(),
            self.telemetry.clone(),
        )
        .inspect_err(|err| {
            tracing::warn!(activity = %activity_id, error = %err, "activity cannot be played");
        })?;
        Ok(session)
    }

    /// # Errors
    ///
    /// Returns `PlayError::Storage` if the listing fails.
    pub async fn list_activities(&self, limit: u32) -> Result<Vec<Activity>, PlayError> {
        Ok(self.activities.list_activities(limit).await?)
    }
}
