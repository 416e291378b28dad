use quest_core::model::{Activity, ActivityId, PlayRecordId};
use sqlx::Row;

use crate::repository::{PlayRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn activity_id_to_i64(id: ActivityId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("activity_id overflow".into()))
}

pub(crate) fn activity_id_from_i64(v: i64) -> Result<ActivityId, StorageError> {
    u64::try_from(v)
        .map(ActivityId::new)
        .map_err(|_| StorageError::Serialization("activity_id sign overflow".into()))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_activity_row(row: &sqlx::sqlite::SqliteRow) -> Result<Activity, StorageError> {
    let payload: String = row.try_get("payload").map_err(ser)?;
    serde_json::from_str(&payload).map_err(ser)
}

pub(crate) fn map_play_record_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<PlayRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let id: PlayRecordId = id.parse().map_err(ser)?;
    let activity_id = activity_id_from_i64(row.try_get::<i64, _>("activity_id").map_err(ser)?)?;
    let score = row
        .try_get::<Option<i64>, _>("score")
        .map_err(ser)?
        .map(|v| u32_from_i64("score", v))
        .transpose()?;
    let duration_secs = row
        .try_get::<Option<i64>, _>("duration_secs")
        .map_err(ser)?
        .map(|v| u32_from_i64("duration_secs", v))
        .transpose()?;
    let completed: bool = row.try_get("completed").map_err(ser)?;

    Ok(PlayRecord {
        id,
        activity_id,
        score,
        completed,
        duration_secs,
    })
}
