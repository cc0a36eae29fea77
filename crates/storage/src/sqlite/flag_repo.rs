use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{FlagRecord, FlagRepository, StorageError};

use super::SqliteRepository;

fn map_flag_row(row: &SqliteRow) -> Result<FlagRecord, StorageError> {
    let key: String = row
        .try_get("key")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let value: String = row
        .try_get("value")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    let updated_at: DateTime<Utc> = row
        .try_get("updated_at")
        .map_err(|err| StorageError::Serialization(err.to_string()))?;
    Ok(FlagRecord {
        key,
        value,
        updated_at,
    })
}

#[async_trait]
impl FlagRepository for SqliteRepository {
    async fn load_flags(&self) -> Result<Vec<FlagRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT key, value, updated_at
            FROM reveal_flags
            ORDER BY key ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        rows.iter().map(map_flag_row).collect()
    }

    async fn get_flag(&self, key: &str) -> Result<Option<FlagRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT key, value, updated_at
            FROM reveal_flags
            WHERE key = ?1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        row.as_ref().map(map_flag_row).transpose()
    }

    async fn put_flag(&self, record: &FlagRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO reveal_flags (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&record.key)
        .bind(&record.value)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}
