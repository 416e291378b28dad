use chrono::Utc;
use quest_core::model::{ActivityId, PlayRecordId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{activity_id_to_i64, conn, map_play_record_row, ser};
use crate::repository::{
    PlayCountRepository, PlayRecord, PlayRecordRepository, PlayRecordUpdate, StorageError,
};

#[async_trait::async_trait]
impl PlayRecordRepository for SqliteRepository {
    async fn record_play_start(
        &self,
        activity_id: ActivityId,
    ) -> Result<PlayRecordId, StorageError> {
        let id = PlayRecordId::generate();
        sqlx::query(
            r"
            INSERT INTO play_records (id, activity_id, started_at, completed)
            VALUES (?1, ?2, ?3, 0)
            ",
        )
        .bind(id.to_string())
        .bind(activity_id_to_i64(activity_id)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(id)
    }

    async fn update_play_record(
        &self,
        id: PlayRecordId,
        update: &PlayRecordUpdate,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE play_records
            SET score = ?2, completed = ?3, duration_secs = ?4, finished_at = ?5
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .bind(i64::from(update.score))
        .bind(update.completed)
        .bind(i64::from(update.duration_secs))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_play_record(&self, id: PlayRecordId) -> Result<PlayRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, activity_id, score, completed, duration_secs
            FROM play_records
            WHERE id = ?1
            ",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_play_record_row(&row)
    }
}

#[async_trait::async_trait]
impl PlayCountRepository for SqliteRepository {
    async fn increment_play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO activity_play_counts (activity_id, plays)
            VALUES (?1, 1)
            ON CONFLICT(activity_id) DO UPDATE SET plays = plays + 1
            RETURNING plays
            ",
        )
        .bind(activity_id_to_i64(activity_id)?)
        .fetch_one(&self.pool)
        .await
        .map_err(conn)?;

        let plays: i64 = row.try_get("plays").map_err(ser)?;
        u64::try_from(plays).map_err(ser)
    }

    async fn play_count(&self, activity_id: ActivityId) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT plays FROM activity_play_counts WHERE activity_id = ?1")
            .bind(activity_id_to_i64(activity_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        let Some(row) = row else {
            return Ok(0);
        };
        let plays: i64 = row.try_get("plays").map_err(ser)?;
        u64::try_from(plays).map_err(ser)
    }
}
