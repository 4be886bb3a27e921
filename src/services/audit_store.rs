//! Audit recorder backed by SQLite.
//!
//! One row per completed request: served requests go to `request_details`,
//! everything else to `failed_requests`. Connections are checked out of the
//! shared pool per insert and returned right after.

use crate::{
    errors::AuditError,
    models::audit::{FailureRecord, SuccessRecord},
};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

/// Append-only sink for audit records.
#[async_trait]
pub trait AuditRecorder: Send + Sync {
    async fn record_success(&self, record: &SuccessRecord) -> Result<(), AuditError>;

    async fn record_failure(&self, record: &FailureRecord) -> Result<(), AuditError>;

    /// Cheap reachability probe used by the readiness endpoint.
    async fn ping(&self) -> Result<(), AuditError>;
}

#[derive(Clone, Debug)]
pub struct SqliteAuditRecorder {
    db: SqlitePool,
}

impl SqliteAuditRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditRecorder for SqliteAuditRecorder {
    async fn record_success(&self, record: &SuccessRecord) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO request_details
                (country, client_ip, gender, age, income, is_banned, time_of_day, requested_file)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.country)
        .bind(&record.client_ip)
        .bind(&record.gender)
        .bind(&record.age)
        .bind(&record.income)
        .bind(record.is_banned)
        .bind(record.time_of_day)
        .bind(&record.requested_file)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn record_failure(&self, record: &FailureRecord) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO failed_requests (time_of_request, requested_file, error_code)
             VALUES (?, ?, ?)",
        )
        .bind(record.time_of_request)
        .bind(&record.requested_file)
        .bind(record.error_code)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AuditError> {
        match sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.db)
            .await?
        {
            1 => Ok(()),
            v => Err(AuditError::Unavailable(format!("unexpected result: {}", v))),
        }
    }
}

/// Apply the embedded audit schema statement by statement.
pub async fn apply_schema(db: &SqlitePool) -> Result<usize, AuditError> {
    let statements = SCHEMA
        .split(';')
        .map(strip_comments)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(statements.len())
}

/// Create the audit tables if they are missing, as part of a normal start.
///
/// An unreachable database is only logged; inserts keep failing until it is
/// back, and a later start or `--migrate` creates the tables.
pub async fn ensure_schema(db: &SqlitePool) -> bool {
    match apply_schema(db).await {
        Ok(applied) => {
            info!(statements = applied, "audit schema ready");
            true
        }
        Err(e) => {
            warn!(error = %e, "audit schema not applied, audit writes will fail");
            false
        }
    }
}

fn strip_comments(chunk: &str) -> String {
    chunk
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn recorder() -> (SqlitePool, SqliteAuditRecorder) {
        // One connection: every checkout must see the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        apply_schema(&pool).await.unwrap();
        (pool.clone(), SqliteAuditRecorder::new(pool))
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let (pool, _) = recorder().await;
        assert_eq!(apply_schema(&pool).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn startup_creates_tables_on_a_fresh_database() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let recorder = SqliteAuditRecorder::new(pool.clone());
        let record = FailureRecord {
            time_of_request: Utc::now(),
            requested_file: Some("a/b".into()),
            error_code: 404,
        };
        assert!(recorder.record_failure(&record).await.is_err());

        assert!(ensure_schema(&pool).await);
        assert!(ensure_schema(&pool).await);
        recorder.record_failure(&record).await.unwrap();
    }

    #[tokio::test]
    async fn startup_schema_tolerates_an_unreachable_database() {
        let (pool, _) = recorder().await;
        pool.close().await;
        assert!(!ensure_schema(&pool).await);
    }

    #[tokio::test]
    async fn success_rows_keep_every_field() {
        let (pool, recorder) = recorder().await;
        let record = SuccessRecord {
            country: Some("France".into()),
            client_ip: Some("203.0.113.7".into()),
            gender: None,
            age: "0".into(),
            income: "0.0".into(),
            is_banned: false,
            time_of_day: NaiveTime::from_hms_opt(13, 45, 10).unwrap(),
            requested_file: "folder/file.html".into(),
        };
        recorder.record_success(&record).await.unwrap();

        let stored: SuccessRecord = sqlx::query_as(
            "SELECT country, client_ip, gender, age, income, is_banned, time_of_day, requested_file
             FROM request_details",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn failure_rows_allow_missing_file() {
        let (pool, recorder) = recorder().await;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        recorder
            .record_failure(&FailureRecord {
                time_of_request: at,
                requested_file: None,
                error_code: 501,
            })
            .await
            .unwrap();
        recorder
            .record_failure(&FailureRecord {
                time_of_request: at,
                requested_file: Some("x/y".into()),
                error_code: 403,
            })
            .await
            .unwrap();

        let rows: Vec<FailureRecord> = sqlx::query_as(
            "SELECT time_of_request, requested_file, error_code FROM failed_requests ORDER BY id",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].requested_file, None);
        assert_eq!(rows[0].error_code, 501);
        assert_eq!(rows[1].requested_file.as_deref(), Some("x/y"));
        assert_eq!(rows[1].time_of_request, at);
    }

    #[tokio::test]
    async fn closed_pool_reports_errors() {
        let (pool, recorder) = recorder().await;
        assert!(recorder.ping().await.is_ok());
        pool.close().await;
        assert!(recorder.ping().await.is_err());
        let err = recorder
            .record_failure(&FailureRecord {
                time_of_request: Utc::now(),
                requested_file: None,
                error_code: 400,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Sqlx(_)));
    }
}
