use async_trait::async_trait;
use quest_core::model::{Activity, ActivityId, PlayRecordId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Final numbers reported for a play-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayRecordUpdate {
    pub score: u32,
    pub completed: bool,
    pub duration_secs: u32,
}

/// Server-side trace of one play-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    pub id: PlayRecordId,
    pub activity_id: ActivityId,
    pub score: Option<u32>,
    pub completed: bool,
    pub duration_secs: Option<u32>,
}

impl PlayRecord {
    #[must_use]
    pub fn started(id: PlayRecordId, activity_id: ActivityId) -> Self {
        Self {
            id,
            activity_id,
            score: None,
            completed: false,
            duration_secs: None,
        }
    }

    pub fn apply(&mut self, update: &PlayRecordUpdate) {
        self.score = Some(update.score);
        self.completed = update.completed;
        self.duration_secs = Some(update.duration_secs);
    }
}

/// Small string slot store used for resumable progress.
///
/// Browser storage, a mobile preferences file, a `SQLite` table or a map in a
/// test all fit behind this contract.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Read access to playable content.
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Persist or replace an activity.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the activity cannot be stored.
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), StorageError>;

    /// Fetch an activity by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StorageError>;

    /// List up to `limit` activities ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the listing fails.
    async fn list_activities(&self, limit: u32) -> Result<Vec<Activity>, StorageError>;
}

#[async_trait]
pub trait PlayRecordRepository: Send + Sync {
    /// Open a record for a new play-through and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be created.
    async fn record_play_start(&self, activity_id: ActivityId)
    -> Result<PlayRecordId, StorageError>;

    /// Store the final score, completion flag and duration.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown record, or other storage errors.
    async fn update_play_record(
        &self,
        id: PlayRecordId,
        update: &PlayRecordUpdate,
    ) -> Result<(), StorageError>;

    /// Fetch a record by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_play_record(&self, id: PlayRecordId) -> Result<PlayRecord, StorageError>;
}

#[async_trait]
pub trait PlayCountRepository: Send + Sync {
    /// Bump the play counter of an activity and return the new count.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be updated.
    async fn increment_play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError>;

    /// Current play counter of an activity (0 when never played).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be read.
    async fn play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    activities: Arc<Mutex<HashMap<ActivityId, Activity>>>,
    slots: Arc<Mutex<HashMap<String, String>>>,
    records: Arc<Mutex<HashMap<PlayRecordId, PlayRecord>>>,
    counts: Arc<Mutex<HashMap<ActivityId, u64>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

#[async_trait]
impl KeyValueStore for InMemoryRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.slots)?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        lock(&self.slots)?.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        lock(&self.slots)?.remove(key);
        Ok(())
    }
}

#[async_trait]
impl ActivityRepository for InMemoryRepository {
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), StorageError> {
        lock(&self.activities)?.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StorageError> {
        lock(&self.activities)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_activities(&self, limit: u32) -> Result<Vec<Activity>, StorageError> {
        let guard = lock(&self.activities)?;
        let mut all: Vec<Activity> = guard.values().cloned().collect();
        all.sort_by_key(|activity| activity.id);
        all.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(all)
    }
}

#[async_trait]
impl PlayRecordRepository for InMemoryRepository {
    async fn record_play_start(
        &self,
        activity_id: ActivityId,
    ) -> Result<PlayRecordId, StorageError> {
        let id = PlayRecordId::generate();
        lock(&self.records)?.insert(id, PlayRecord::started(id, activity_id));
        Ok(id)
    }

    async fn update_play_record(
        &self,
        id: PlayRecordId,
        update: &PlayRecordUpdate,
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.records)?;
        let record = guard.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.apply(update);
        Ok(())
    }

    async fn get_play_record(&self, id: PlayRecordId) -> Result<PlayRecord, StorageError> {
        lock(&self.records)?
            .get(&id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl PlayCountRepository for InMemoryRepository {
    async fn increment_play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        let mut guard = lock(&self.counts)?;
        let count = guard.entry(activity_id).or_insert(0);
        *count = count.saturating_add(1);
        Ok(*count)
    }

    async fn play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        Ok(lock(&self.counts)?.get(&activity_id).copied().unwrap_or(0))
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub activities: Arc<dyn ActivityRepository>,
    pub progress_slots: Arc<dyn KeyValueStore>,
    pub play_records: Arc<dyn PlayRecordRepository>,
    pub play_counts: Arc<dyn PlayCountRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            activities: Arc::new(repo.clone()),
            progress_slots: Arc::new(repo.clone()),
            play_records: Arc::new(repo.clone()),
            play_counts: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_core::model::Question;

    fn quiz(id: u64) -> Activity {
        Activity::quiz(
            ActivityId::new(id),
            format!("Quiz {id}"),
            vec![Question::multiple_choice("Q", ["a", "b"], 0, "")],
        )
    }

    #[tokio::test]
    async fn slots_overwrite_and_delete() {
        let repo = InMemoryRepository::new();
        repo.set("k", "one").await.unwrap();
        repo.set("k", "two").await.unwrap();
        assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("two"));

        repo.delete("k").await.unwrap();
        repo.delete("k").await.unwrap();
        assert!(repo.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn activities_list_in_id_order() {
        let repo = InMemoryRepository::new();
        for id in [3, 1, 2] {
            repo.upsert_activity(&quiz(id)).await.unwrap();
        }
        let listed = repo.list_activities(2).await.unwrap();
        let ids: Vec<u64> = listed.iter().map(|a| a.id.value()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(matches!(
            repo.get_activity(ActivityId::new(9)).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn play_records_start_open_and_close_with_update() {
        let repo = InMemoryRepository::new();
        let id = repo.record_play_start(ActivityId::new(1)).await.unwrap();
        let opened = repo.get_play_record(id).await.unwrap();
        assert!(!opened.completed);
        assert_eq!(opened.score, None);

        let update = PlayRecordUpdate {
            score: 200,
            completed: true,
            duration_secs: 42,
        };
        repo.update_play_record(id, &update).await.unwrap();
        let closed = repo.get_play_record(id).await.unwrap();
        assert_eq!(closed.score, Some(200));
        assert!(closed.completed);
        assert_eq!(closed.duration_secs, Some(42));
    }

    #[tokio::test]
    async fn updating_unknown_record_is_not_found() {
        let repo = InMemoryRepository::new();
        let update = PlayRecordUpdate {
            score: 0,
            completed: false,
            duration_secs: 0,
        };
        let err = repo
            .update_play_record(PlayRecordId::generate(), &update)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn play_counts_accumulate_per_activity() {
        let repo = InMemoryRepository::new();
        let a = ActivityId::new(1);
        assert_eq!(repo.play_count(a).await.unwrap(), 0);
        repo.increment_play_count(a).await.unwrap();
        assert_eq!(repo.increment_play_count(a).await.unwrap(), 2);
        assert_eq!(repo.play_count(ActivityId::new(2)).await.unwrap(), 0);
    }
}
