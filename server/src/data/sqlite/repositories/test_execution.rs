//! Test-execution repository

use chrono::Utc;
use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{TestExecutionKey, TestExecutionRow};
use super::to_nanos;
use crate::utils::time::nanos_i64_to_datetime;

type TestExecutionTuple = (String, String, String, Option<String>, i64, i64);

fn row_from_tuple(
    (test_run_id, test_id, test_configuration_id, test_result_id, created_at, updated_at): TestExecutionTuple,
) -> TestExecutionRow {
    TestExecutionRow {
        test_run_id,
        test_id,
        test_configuration_id,
        test_result_id,
        created_at: nanos_i64_to_datetime(created_at),
        updated_at: nanos_i64_to_datetime(updated_at),
    }
}

pub async fn get_test_execution(
    pool: &SqlitePool,
    key: &TestExecutionKey,
) -> Result<Option<TestExecutionRow>, SqliteError> {
    let row = sqlx::query_as::<_, TestExecutionTuple>(
        r#"SELECT test_run_id, test_id, test_configuration_id, test_result_id, created_at, updated_at
           FROM test_executions
           WHERE test_run_id = ? AND test_id = ? AND test_configuration_id = ?"#,
    )
    .bind(&key.test_run_id)
    .bind(&key.test_id)
    .bind(&key.test_configuration_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_from_tuple))
}

async fn fetch_existing(
    pool: &SqlitePool,
    key: &TestExecutionKey,
) -> Result<TestExecutionRow, SqliteError> {
    get_test_execution(pool, key).await?.ok_or_else(|| {
        SqliteError::Conflict(format!(
            "test execution ({}, {}, {}) vanished after write",
            key.test_run_id, key.test_id, key.test_configuration_id
        ))
    })
}

/// Insert the record without a result; an existing record is returned unchanged
pub async fn create_test_execution(
    pool: &SqlitePool,
    key: &TestExecutionKey,
) -> Result<TestExecutionRow, SqliteError> {
    let now = to_nanos(&Utc::now(), "updated_at")?;
    sqlx::query(
        r#"INSERT INTO test_executions
               (test_run_id, test_id, test_configuration_id, test_result_id, created_at, updated_at)
           VALUES (?, ?, ?, NULL, ?, ?)
           ON CONFLICT(test_run_id, test_id, test_configuration_id) DO NOTHING"#,
    )
    .bind(&key.test_run_id)
    .bind(&key.test_id)
    .bind(&key.test_configuration_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_existing(pool, key).await
}

/// Attach a result id, creating the record when needed.
///
/// Linked is terminal: a record that already has a result keeps it.
pub async fn record_test_result(
    pool: &SqlitePool,
    key: &TestExecutionKey,
    test_result_id: &str,
) -> Result<TestExecutionRow, SqliteError> {
    let now = to_nanos(&Utc::now(), "updated_at")?;
    sqlx::query(
        r#"INSERT INTO test_executions
               (test_run_id, test_id, test_configuration_id, test_result_id, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?)
           ON CONFLICT(test_run_id, test_id, test_configuration_id) DO UPDATE SET
               test_result_id = COALESCE(test_executions.test_result_id, excluded.test_result_id),
               updated_at = CASE
                   WHEN test_executions.test_result_id IS NULL THEN excluded.updated_at
                   ELSE test_executions.updated_at
               END"#,
    )
    .bind(&key.test_run_id)
    .bind(&key.test_id)
    .bind(&key.test_configuration_id)
    .bind(test_result_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    fetch_existing(pool, key).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SqliteService;

    fn key() -> TestExecutionKey {
        TestExecutionKey::new("run-1", "test-1", "config-1")
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = SqliteService::open_in_memory().await.unwrap();
        assert!(get_test_execution(db.pool(), &key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let first = create_test_execution(db.pool(), &key()).await.unwrap();
        let second = create_test_execution(db.pool(), &key()).await.unwrap();

        assert_eq!(first, second);
        assert!(first.test_result_id.is_none());
        assert_eq!(first.key(), key());
    }

    #[tokio::test]
    async fn test_record_result_creates_missing_record() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let row = record_test_result(db.pool(), &key(), "result-1").await.unwrap();
        assert_eq!(row.test_result_id.as_deref(), Some("result-1"));
    }

    #[tokio::test]
    async fn test_record_result_fills_existing_record() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let created = create_test_execution(db.pool(), &key()).await.unwrap();
        let row = record_test_result(db.pool(), &key(), "result-1").await.unwrap();

        assert_eq!(row.created_at, created.created_at);
        assert_eq!(row.test_result_id.as_deref(), Some("result-1"));
    }

    #[tokio::test]
    async fn test_record_result_keeps_first_result() {
        let db = SqliteService::open_in_memory().await.unwrap();
        record_test_result(db.pool(), &key(), "result-1").await.unwrap();
        let row = record_test_result(db.pool(), &key(), "result-2").await.unwrap();
        assert_eq!(row.test_result_id.as_deref(), Some("result-1"));
    }

    #[tokio::test]
    async fn test_create_after_result_does_not_clear_it() {
        let db = SqliteService::open_in_memory().await.unwrap();
        record_test_result(db.pool(), &key(), "result-1").await.unwrap();
        let row = create_test_execution(db.pool(), &key()).await.unwrap();
        assert_eq!(row.test_result_id.as_deref(), Some("result-1"));
    }
}
