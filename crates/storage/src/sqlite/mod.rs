use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    ActivityRepository, KeyValueStore, PlayCountRepository, PlayRecordRepository, Storage,
};

mod activity_repo;
mod mapping;
mod migrate;
mod play_record_repo;
mod progress_slot_repo;

/// `SQLite` backend for every play repository.
///
/// One pool serves four tables: `activities` (JSON payload per row),
/// `progress_slots` (key-value), `play_records` and `activity_play_counts`.
/// Play records and counters keep a bare `activity_id` with no foreign key, so
/// history outlives a deleted activity and `PRAGMA foreign_keys` stays off.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open a pool in WAL mode. Each connection waits up to five seconds on a
    /// locked database, which covers telemetry writes racing progress saves.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or a pragma
    /// is rejected.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bring the play schema up to date. Safe to call on every start.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration step fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Connect, migrate, and hand the same pool to all four play repositories.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let activities: Arc<dyn ActivityRepository> = Arc::new(repo.clone());
        let progress_slots: Arc<dyn KeyValueStore> = Arc::new(repo.clone());
        let play_records: Arc<dyn PlayRecordRepository> = Arc::new(repo.clone());
        let play_counts: Arc<dyn PlayCountRepository> = Arc::new(repo);
        Ok(Self {
            activities,
            progress_slots,
            play_records,
            play_counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteRepository>();
    }

    #[tokio::test]
    async fn play_records_do_not_reference_activities() {
        let repo = SqliteRepository::connect("sqlite:file:records_no_fk?mode=memory&cache=shared")
            .await
            .unwrap();
        repo.migrate().await.unwrap();

        let fks: Vec<(i64,)> = sqlx::query_as("SELECT id FROM pragma_foreign_key_list('play_records')")
            .fetch_all(repo.pool())
            .await
            .unwrap();
        assert!(fks.is_empty());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name != 'schema_migrations' ORDER BY name",
        )
        .fetch_all(repo.pool())
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(name,)| name.as_str()).collect();
        assert_eq!(
            names,
            ["activities", "activity_play_counts", "play_records", "progress_slots"]
        );
    }
}
