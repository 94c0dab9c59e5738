//! SQLite storage backend
//!
//! Embedded database in WAL mode with a small connection pool. The schema
//! lives in `migrations/` and is applied on open.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument, warn};

use crate::history::StoredCheck;
use crate::incidents::Incident;

use super::backend::{HealthStatus, StorageBackend};
use super::error::{StorageError, StorageResult};

pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Open (or create) the database at `db_path` and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    fn millis_to_timestamp(millis: i64) -> StorageResult<DateTime<Utc>> {
        DateTime::from_timestamp_millis(millis)
            .ok_or_else(|| StorageError::BackendError(format!("timestamp out of range: {millis}")))
    }

    fn check_from_row(row: &SqliteRow) -> StorageResult<(String, StoredCheck)> {
        let check = StoredCheck {
            timestamp: Self::millis_to_timestamp(row.try_get("timestamp")?)?,
            success: row.try_get("success")?,
            status_code: row
                .try_get::<Option<i64>, _>("status_code")?
                .map(|code| code as u16),
            response_time_ms: row
                .try_get::<Option<i64>, _>("response_time_ms")?
                .map(|ms| ms as u64),
            error: row.try_get("error")?,
            ssl_days_remaining: row.try_get("ssl_days_remaining")?,
        };
        Ok((row.try_get("target")?, check))
    }

    fn incident_from_row(row: &SqliteRow) -> StorageResult<Incident> {
        let resolved_at = row
            .try_get::<Option<i64>, _>("resolved_at")?
            .map(Self::millis_to_timestamp)
            .transpose()?;

        Ok(Incident {
            id: row.try_get::<i64, _>("id")? as u64,
            target: row.try_get("target")?,
            error: row.try_get("error")?,
            opened_at: Self::millis_to_timestamp(row.try_get("opened_at")?)?,
            resolved: row.try_get("resolved")?,
            resolved_at,
        })
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self, check))]
    async fn insert_check(&self, target: &str, check: &StoredCheck) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO service_checks (
                target, timestamp, success, status_code,
                response_time_ms, error, ssl_days_remaining
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(target)
        .bind(check.timestamp.timestamp_millis())
        .bind(check.success)
        .bind(check.status_code.map(i64::from))
        .bind(check.response_time_ms.map(|ms| ms as i64))
        .bind(&check.error)
        .bind(check.ssl_days_remaining)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_checks(&self, since: DateTime<Utc>) -> StorageResult<Vec<(String, StoredCheck)>> {
        let rows = sqlx::query(
            r#"
            SELECT target, timestamp, success, status_code,
                   response_time_ms, error, ssl_days_remaining
            FROM service_checks
            WHERE timestamp >= ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let checks = rows
            .iter()
            .map(Self::check_from_row)
            .collect::<StorageResult<Vec<_>>>()?;
        debug!("loaded {} checks", checks.len());
        Ok(checks)
    }

    #[instrument(skip(self), fields(before = %before))]
    async fn cleanup_old_checks(&self, before: DateTime<Utc>) -> StorageResult<usize> {
        let result = sqlx::query("DELETE FROM service_checks WHERE timestamp < ?")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() as usize;
        if deleted > 0 {
            info!("deleted {} old checks", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip_all, fields(count = incidents.len()))]
    async fn replace_incidents(&self, incidents: &[Incident]) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM incidents").execute(&mut *tx).await?;
        for incident in incidents {
            sqlx::query(
                r#"
                INSERT INTO incidents (id, target, error, opened_at, resolved, resolved_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(incident.id as i64)
            .bind(&incident.target)
            .bind(&incident.error)
            .bind(incident.opened_at.timestamp_millis())
            .bind(incident.resolved)
            .bind(incident.resolved_at.map(|at| at.timestamp_millis()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_incidents(&self) -> StorageResult<Vec<Incident>> {
        let rows = sqlx::query(
            r#"
            SELECT id, target, error, opened_at, resolved, resolved_at
            FROM incidents
            ORDER BY opened_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::incident_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "SQLite backend operational".to_string(),
                metadata: HashMap::from([
                    ("backend".to_string(), "sqlite".to_string()),
                    ("db_path".to_string(), self.db_path.clone()),
                ]),
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_stats(&self) -> StorageResult<String> {
        let (checks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM service_checks")
            .fetch_one(&self.pool)
            .await?;
        let (incidents,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM incidents")
            .fetch_one(&self.pool)
            .await?;
        let (oldest, newest): (Option<i64>, Option<i64>) =
            sqlx::query_as("SELECT MIN(timestamp), MAX(timestamp) FROM service_checks")
                .fetch_one(&self.pool)
                .await?;

        let file_size_mb = std::fs::metadata(&self.db_path)
            .map(|m| m.len())
            .unwrap_or(0) as f64
            / 1_000_000.0;

        let time_range = match (oldest, newest) {
            (Some(old), Some(new)) => format!(
                "{} to {}",
                Self::millis_to_timestamp(old)?.format("%Y-%m-%d"),
                Self::millis_to_timestamp(new)?.format("%Y-%m-%d")
            ),
            _ => "no data".to_string(),
        };

        Ok(format!(
            "SQLite: {} checks, {} incidents, {:.2} MB on disk, time range: {}",
            checks, incidents, file_size_mb, time_range
        ))
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
