use chrono::Utc;
use quest_core::model::{Activity, ActivityId};

use super::SqliteRepository;
use super::mapping::{activity_id_to_i64, conn, map_activity_row, ser};
use crate::repository::{ActivityRepository, StorageError};

#[async_trait::async_trait]
impl ActivityRepository for SqliteRepository {
    async fn upsert_activity(&self, activity: &Activity) -> Result<(), StorageError> {
        let id = activity_id_to_i64(activity.id)?;
        let payload = serde_json::to_string(activity).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO activities (id, title, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                payload = excluded.payload,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id)
        .bind(&activity.title)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn get_activity(&self, id: ActivityId) -> Result<Activity, StorageError> {
        let row = sqlx::query("SELECT payload FROM activities WHERE id = ?1")
            .bind(activity_id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_activity_row(&row)
    }

    async fn list_activities(&self, limit: u32) -> Result<Vec<Activity>, StorageError> {
        let rows = sqlx::query("SELECT payload FROM activities ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_activity_row).collect()
    }
}
