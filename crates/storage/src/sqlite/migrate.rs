use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_reveal_flags",
        sql: r"
            CREATE TABLE IF NOT EXISTS reveal_flags (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
    },
    Migration {
        version: 2,
        name: "index_reveal_flags_updated_at",
        sql: r"
            CREATE INDEX IF NOT EXISTS idx_reveal_flags_updated_at
                ON reveal_flags (updated_at);
        ",
    },
];

pub const LATEST_SCHEMA_VERSION: i64 = 2;

async fn ensure_version_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn current_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    ensure_version_table(pool).await?;
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version, each in its own
/// transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    let applied = current_version(pool).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(pool, migration)
            .await
            .map_err(|source| SqliteInitError::Migration {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied schema migration"
        );
    }

    Ok(())
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query(migration.sql).execute(&mut *tx).await?;
    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, name, applied_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(migration.version)
    .bind(migration.name)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}
