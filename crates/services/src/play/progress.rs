use std::sync::Arc;

use chrono::Duration;
use quest_core::Clock;
use quest_core::model::{ActivityId, SessionProgress};
use storage::repository::{KeyValueStore, StorageError};

/// Slot holding the resumable progress of one activity.
#[must_use]
pub fn slot_key(activity_id: ActivityId) -> String {
    format!("quest_progress_{activity_id}")
}

/// Persists one `SessionProgress` document per activity as JSON.
#[derive(Clone)]
pub struct ProgressStore {
    slots: Arc<dyn KeyValueStore>,
    clock: Clock,
    ttl: Duration,
}

impl ProgressStore {
    #[must_use]
    pub fn new(slots: Arc<dyn KeyValueStore>, clock: Clock, ttl: Duration) -> Self {
        Self { slots, clock, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Overwrite the slot of `progress.activity_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be encoded or written.
    pub async fn save(&self, progress: &SessionProgress) -> Result<(), StorageError> {
        let json = serde_json::to_string(progress)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.slots.set(&slot_key(progress.activity_id), &json).await
    }

    /// Read saved progress. A slot that no longer decodes is removed and
    /// reported as empty.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn load(
        &self,
        activity_id: ActivityId,
    ) -> Result<Option<SessionProgress>, StorageError> {
        let key = slot_key(activity_id);
        let Some(raw) = self.slots.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<SessionProgress>(&raw) {
            Ok(progress) if progress.activity_id == activity_id => Ok(Some(progress)),
            Ok(progress) => {
                tracing::debug!(%key, found = %progress.activity_id, "progress slot belongs to another activity");
                self.discard(&key).await;
                Ok(None)
            }
            Err(err) => {
                tracing::debug!(%key, error = %err, "dropping unreadable progress slot");
                self.discard(&key).await;
                Ok(None)
            }
        }
    }

    #[must_use]
    pub fn is_expired(&self, progress: &SessionProgress) -> bool {
        progress.is_expired_at(self.clock.now(), self.ttl)
    }

    /// Remove saved progress for an activity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    pub async fn clear(&self, activity_id: ActivityId) -> Result<(), StorageError> {
        self.slots.delete(&slot_key(activity_id)).await
    }

    /// Load progress that is still fresh enough to resume. Expired progress is
    /// cleared.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    pub async fn load_resumable(
        &self,
        activity_id: ActivityId,
    ) -> Result<Option<SessionProgress>, StorageError> {
        let Some(progress) = self.load(activity_id).await? else {
            return Ok(None);
        };
        if self.is_expired(&progress) {
            tracing::debug!(activity = %activity_id, "saved progress expired");
            self.discard(&slot_key(activity_id)).await;
            return Ok(None);
        }
        Ok(Some(progress))
    }

    async fn discard(&self, key: &str) {
        if let Err(err) = self.slots.delete(key).await {
            tracing::warn!(%key, error = %err, "failed to remove progress slot");
        }
    }
}
