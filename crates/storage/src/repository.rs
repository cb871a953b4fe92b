//! SQLite Repository

use crate::{FeatureQuery, FeatureStore, ModelRecord, ModelStore, StorageError};
use chrono::{DateTime, Utc};
use feature_engine::FeatureVector;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tokio::runtime::Runtime;
use tracing::{debug, info};
use uuid::Uuid;

/// Durable store over a single SQLite connection.
///
/// The pool is driven by a private current-thread runtime so callers stay
/// synchronous. A single connection serializes writers, which keeps version
/// assignment race free and keeps `sqlite::memory:` databases alive.
pub struct Repository {
    pool: SqlitePool,
    runtime: Runtime,
}

impl Repository {
    /// Open (creating if missing) the database at `url` and apply the schema
    pub fn connect(url: &str) -> Result<Self, StorageError> {
        if !url.starts_with("sqlite:") {
            return Err(StorageError::InvalidUrl(url.to_string()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| StorageError::DatabaseError(format!("Runtime error: {}", e)))?;

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::InvalidUrl(format!("{}: {}", url, e)))?
            .create_if_missing(true);

        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options),
        )?;
        runtime.block_on(create_schema(&pool))?;

        info!("Opened SQLite repository at {}", url);
        Ok(Self { pool, runtime })
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

/// Create tables and indexes (idempotent)
async fn create_schema(pool: &SqlitePool) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS features (
            seq          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT    NOT NULL UNIQUE,
            timestamp_ms INTEGER NOT NULL,
            row_json     TEXT    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_features_timestamp
            ON features (timestamp_ms, seq);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS models (
            seq        INTEGER PRIMARY KEY AUTOINCREMENT,
            id         TEXT    NOT NULL UNIQUE,
            name       TEXT    NOT NULL,
            version    INTEGER NOT NULL,
            payload    BLOB    NOT NULL,
            metadata   TEXT    NOT NULL,
            created_at TEXT    NOT NULL,
            UNIQUE (name, version)
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

impl FeatureStore for Repository {
    fn append(&self, vectors: &[FeatureVector]) -> Result<usize, StorageError> {
        let rows = vectors
            .iter()
            .map(|v| -> Result<(i64, String), StorageError> {
                Ok((v.timestamp().timestamp_millis(), serde_json::to_string(v)?))
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            for (timestamp_ms, json) in &rows {
                sqlx::query("INSERT INTO features (id, timestamp_ms, row_json) VALUES (?, ?, ?)")
                    .bind(Uuid::new_v4().to_string())
                    .bind(timestamp_ms)
                    .bind(json)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;
            Ok::<_, StorageError>(())
        })?;

        debug!("Appended {} feature rows", rows.len());
        Ok(rows.len())
    }

    fn query(&self, query: &FeatureQuery) -> Result<Vec<FeatureVector>, StorageError> {
        let start = query.start.map(|t| t.timestamp_millis());
        let end = query.end.map(|t| t.timestamp_millis());
        // negative LIMIT means no limit in SQLite
        let limit = query
            .limit
            .map(|l| i64::try_from(l).unwrap_or(i64::MAX))
            .unwrap_or(-1);

        let sql = if query.newest {
            r#"
            SELECT row_json FROM features
            WHERE (? IS NULL OR timestamp_ms >= ?)
              AND (? IS NULL OR timestamp_ms <= ?)
            ORDER BY timestamp_ms DESC, seq DESC
            LIMIT ?
            "#
        } else {
            r#"
            SELECT row_json FROM features
            WHERE (? IS NULL OR timestamp_ms >= ?)
              AND (? IS NULL OR timestamp_ms <= ?)
            ORDER BY timestamp_ms ASC, seq ASC
            LIMIT ?
            "#
        };

        let rows = self.runtime.block_on(
            sqlx::query(sql)
                .bind(start)
                .bind(start)
                .bind(end)
                .bind(end)
                .bind(limit)
                .fetch_all(&self.pool),
        )?;

        let mut vectors = rows
            .iter()
            .map(|row| -> Result<FeatureVector, StorageError> {
                let json: String = row.try_get("row_json")?;
                Ok(serde_json::from_str(&json)?)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if query.newest {
            vectors.reverse();
        }
        Ok(vectors)
    }
}

impl ModelStore for Repository {
    fn put(
        &self,
        name: &str,
        payload: &[u8],
        metadata: &serde_json::Value,
    ) -> Result<u32, StorageError> {
        let metadata = serde_json::to_string(metadata)?;

        let version: i64 = self.runtime.block_on(async {
            let mut tx = self.pool.begin().await?;
            let version: i64 =
                sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) + 1 FROM models WHERE name = ?")
                    .bind(name)
                    .fetch_one(&mut *tx)
                    .await?;

            sqlx::query(
                r#"
                INSERT INTO models (id, name, version, payload, metadata, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(name)
            .bind(version)
            .bind(payload)
            .bind(&metadata)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            Ok::<_, StorageError>(version)
        })?;

        debug!("Stored model {} version {}", name, version);
        u32::try_from(version)
            .map_err(|_| StorageError::DatabaseError(format!("version {} out of range", version)))
    }

    fn get(&self, name: &str, version: Option<u32>) -> Result<Option<ModelRecord>, StorageError> {
        let version = version.map(i64::from);
        let row = self.runtime.block_on(
            sqlx::query(
                r#"
                SELECT name, version, payload, metadata, created_at FROM models
                WHERE name = ? AND (? IS NULL OR version = ?)
                ORDER BY seq DESC
                LIMIT 1
                "#,
            )
            .bind(name)
            .bind(version)
            .bind(version)
            .fetch_optional(&self.pool),
        )?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored_version: i64 = row.try_get("version")?;
        let metadata: String = row.try_get("metadata")?;
        let created_at: String = row.try_get("created_at")?;

        Ok(Some(ModelRecord {
            name: row.try_get("name")?,
            version: u32::try_from(stored_version).map_err(|_| {
                StorageError::DatabaseError(format!("version {} out of range", stored_version))
            })?,
            payload: row.try_get("payload")?,
            metadata: serde_json::from_str(&metadata)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map_err(|e| StorageError::SerializationError(e.to_string()))?
                .with_timezone(&Utc),
        }))
    }
}
