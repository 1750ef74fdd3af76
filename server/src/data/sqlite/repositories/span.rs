//! Span repository

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::data::sqlite::SqliteError;
use crate::data::types::{Span, SpanKind, StatusCode, TestExecutionKey};
use super::to_nanos;
use crate::utils::time::nanos_i64_to_datetime;

const SPAN_COLUMNS: &str = "trace_id, span_id, parent_span_id, project_id, environment, \
    span_name, span_kind, start_time, end_time, status_code, status_message, attributes, \
    events, links, test_run_id, test_id, test_configuration_id, test_result_id";

fn to_json<T: serde::Serialize>(value: &T, column: &str) -> Result<String, SqliteError> {
    serde_json::to_string(value)
        .map_err(|e| SqliteError::InvalidRow(format!("encode {column}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str, column: &str) -> Result<T, SqliteError> {
    serde_json::from_str(raw).map_err(|e| SqliteError::InvalidRow(format!("decode {column}: {e}")))
}

fn span_from_row(row: &SqliteRow) -> Result<Span, SqliteError> {
    let kind: String = row.try_get("span_kind")?;
    let status: String = row.try_get("status_code")?;
    let attributes: String = row.try_get("attributes")?;
    let events: String = row.try_get("events")?;
    let links: String = row.try_get("links")?;

    Ok(Span {
        trace_id: row.try_get("trace_id")?,
        span_id: row.try_get("span_id")?,
        parent_span_id: row.try_get("parent_span_id")?,
        project_id: row.try_get("project_id")?,
        environment: row.try_get("environment")?,
        span_name: row.try_get("span_name")?,
        span_kind: SpanKind::parse(&kind)
            .ok_or_else(|| SqliteError::InvalidRow(format!("unknown span kind '{kind}'")))?,
        start_time: nanos_i64_to_datetime(row.try_get("start_time")?),
        end_time: nanos_i64_to_datetime(row.try_get("end_time")?),
        status_code: StatusCode::parse(&status)
            .ok_or_else(|| SqliteError::InvalidRow(format!("unknown status '{status}'")))?,
        status_message: row.try_get("status_message")?,
        attributes: from_json(&attributes, "attributes")?,
        events: from_json(&events, "events")?,
        links: from_json(&links, "links")?,
        test_run_id: row.try_get("test_run_id")?,
        test_id: row.try_get("test_id")?,
        test_configuration_id: row.try_get("test_configuration_id")?,
        test_result_id: row.try_get("test_result_id")?,
    })
}

/// Insert a batch of spans atomically.
///
/// Any failing statement aborts the transaction, so a batch is either fully
/// visible or not at all. Duplicate `(trace_id, span_id)` pairs are skipped.
pub async fn insert_spans(pool: &SqlitePool, spans: &[Span]) -> Result<u64, SqliteError> {
    if spans.is_empty() {
        return Ok(0);
    }

    let ingested_at = to_nanos(&Utc::now(), "ingested_at")?;
    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;

    for span in spans {
        let result = sqlx::query(&format!(
            "INSERT INTO spans ({SPAN_COLUMNS}, ingested_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(trace_id, span_id) DO NOTHING"
        ))
        .bind(&span.trace_id)
        .bind(&span.span_id)
        .bind(&span.parent_span_id)
        .bind(&span.project_id)
        .bind(&span.environment)
        .bind(&span.span_name)
        .bind(span.span_kind.as_str())
        .bind(to_nanos(&span.start_time, "start_time")?)
        .bind(to_nanos(&span.end_time, "end_time")?)
        .bind(span.status_code.as_str())
        .bind(&span.status_message)
        .bind(to_json(&span.attributes, "attributes")?)
        .bind(to_json(&span.events, "events")?)
        .bind(to_json(&span.links, "links")?)
        .bind(&span.test_run_id)
        .bind(&span.test_id)
        .bind(&span.test_configuration_id)
        .bind(&span.test_result_id)
        .bind(ingested_at)
        .execute(&mut *tx)
        .await?;
        inserted += result.rows_affected();
    }

    tx.commit().await?;
    Ok(inserted)
}

/// Spans of one trace, in insertion order
pub async fn get_trace_spans(
    pool: &SqlitePool,
    project_id: &str,
    trace_id: &str,
) -> Result<Vec<Span>, SqliteError> {
    let rows = sqlx::query(&format!(
        "SELECT {SPAN_COLUMNS} FROM spans WHERE project_id = ? AND trace_id = ? ORDER BY id"
    ))
    .bind(project_id)
    .bind(trace_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(span_from_row).collect()
}

/// Conditional backfill of `test_result_id`.
///
/// The `test_result_id IS NULL` predicate makes concurrent callers safe: only
/// one of them can move a span from unlinked to linked.
pub async fn link_test_result(
    pool: &SqlitePool,
    key: &TestExecutionKey,
    test_result_id: &str,
) -> Result<u64, SqliteError> {
    let result = sqlx::query(
        r#"UPDATE spans SET test_result_id = ?
           WHERE test_run_id = ? AND test_id = ? AND test_configuration_id = ?
             AND test_result_id IS NULL"#,
    )
    .bind(test_result_id)
    .bind(&key.test_run_id)
    .bind(&key.test_id)
    .bind(&key.test_configuration_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Unlinked test-context spans received before `older_than`. Ingestion
/// time, not span start time, so replayed old spans are not instantly stale.
pub async fn count_unlinked_spans(
    pool: &SqlitePool,
    older_than: DateTime<Utc>,
) -> Result<u64, SqliteError> {
    let count: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM spans
           WHERE test_run_id IS NOT NULL AND test_id IS NOT NULL
             AND test_result_id IS NULL AND ingested_at < ?"#,
    )
    .bind(to_nanos(&older_than, "ingested_at")?)
    .fetch_one(pool)
    .await?;

    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SqliteService;
    use crate::data::types::{SpanEvent, SpanLink};
    use chrono::TimeZone;
    use serde_json::{Map, json};

    fn make_span(trace: &str, span: &str, offset_ms: i64) -> Span {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
            + chrono::Duration::milliseconds(offset_ms);
        Span {
            trace_id: trace.to_string(),
            span_id: span.to_string(),
            parent_span_id: None,
            project_id: "default".into(),
            environment: "development".into(),
            span_name: "function.run".into(),
            span_kind: SpanKind::Server,
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(5),
            status_code: StatusCode::Unset,
            status_message: None,
            attributes: Map::new(),
            events: vec![],
            links: vec![],
            test_run_id: None,
            test_id: None,
            test_configuration_id: None,
            test_result_id: None,
        }
    }

    fn with_test_context(mut span: Span, key: &TestExecutionKey) -> Span {
        span.test_run_id = Some(key.test_run_id.clone());
        span.test_id = Some(key.test_id.clone());
        span.test_configuration_id = Some(key.test_configuration_id.clone());
        span
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let mut span = make_span(&"a".repeat(32), &"1".repeat(16), 0);
        span.status_code = StatusCode::Error;
        span.status_message = Some("boom".into());
        span.attributes.insert("http.status_code".into(), json!(500));
        span.events.push(SpanEvent {
            name: "exception".into(),
            timestamp: span.start_time,
            attributes: Map::new(),
        });
        span.links.push(SpanLink {
            trace_id: "b".repeat(32),
            span_id: "2".repeat(16),
            attributes: Map::new(),
        });

        let inserted = insert_spans(db.pool(), std::slice::from_ref(&span))
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let spans = get_trace_spans(db.pool(), "default", &"a".repeat(32))
            .await
            .unwrap();
        assert_eq!(spans, vec![span]);
    }

    #[tokio::test]
    async fn test_duplicate_span_ids_are_ignored() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let span = make_span(&"a".repeat(32), &"1".repeat(16), 0);

        assert_eq!(insert_spans(db.pool(), &[span.clone()]).await.unwrap(), 1);
        assert_eq!(insert_spans(db.pool(), &[span]).await.unwrap(), 0);

        let spans = get_trace_spans(db.pool(), "default", &"a".repeat(32))
            .await
            .unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_span_rolls_back_whole_batch() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let good = make_span(&"a".repeat(32), &"1".repeat(16), 0);
        // Violates the end_time >= start_time check
        let mut bad = make_span(&"a".repeat(32), &"2".repeat(16), 0);
        bad.end_time = bad.start_time - chrono::Duration::seconds(1);

        assert!(insert_spans(db.pool(), &[good, bad]).await.is_err());

        let spans = get_trace_spans(db.pool(), "default", &"a".repeat(32))
            .await
            .unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_get_trace_spans_scoped_by_project() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let mut other = make_span(&"a".repeat(32), &"1".repeat(16), 0);
        other.project_id = "other".into();
        insert_spans(db.pool(), &[other]).await.unwrap();

        let spans = get_trace_spans(db.pool(), "default", &"a".repeat(32))
            .await
            .unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_link_test_result_only_touches_unlinked_matching_spans() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let key = TestExecutionKey::new("run", "test", "config");
        let other_key = TestExecutionKey::new("run", "test", "other-config");
        let trace = "a".repeat(32);

        insert_spans(
            db.pool(),
            &[
                with_test_context(make_span(&trace, "0000000000000001", 0), &key),
                with_test_context(make_span(&trace, "0000000000000002", 1), &key),
                with_test_context(make_span(&trace, "0000000000000003", 2), &other_key),
                make_span(&trace, "0000000000000004", 3),
            ],
        )
        .await
        .unwrap();

        assert_eq!(link_test_result(db.pool(), &key, "result-1").await.unwrap(), 2);
        // Already linked; a second call matches nothing
        assert_eq!(link_test_result(db.pool(), &key, "result-2").await.unwrap(), 0);

        let spans = get_trace_spans(db.pool(), "default", &trace).await.unwrap();
        let linked: Vec<_> = spans.iter().map(|s| s.test_result_id.as_deref()).collect();
        assert_eq!(linked, vec![Some("result-1"), Some("result-1"), None, None]);
    }

    #[tokio::test]
    async fn test_unstorable_timestamp_fails_batch() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let trace = "a".repeat(32);
        let mut far = make_span(&trace, "0000000000000002", 0);
        far.end_time = crate::utils::time::nanos_to_datetime(u64::MAX);

        let err = insert_spans(db.pool(), &[make_span(&trace, "0000000000000001", 0), far])
            .await
            .unwrap_err();
        assert!(matches!(err, SqliteError::InvalidRow(_)));
        assert!(get_trace_spans(db.pool(), "default", &trace).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_unlinked_spans_uses_ingestion_time() {
        let db = SqliteService::open_in_memory().await.unwrap();
        let key = TestExecutionKey::new("run", "test", "config");
        let trace = "a".repeat(32);
        // Start times far in the past, as a replayed export would carry
        let first = with_test_context(make_span(&trace, "0000000000000001", 0), &key);
        let second = with_test_context(make_span(&trace, "0000000000000002", 60_000), &key);
        let plain = make_span(&trace, "0000000000000003", 0);

        insert_spans(db.pool(), &[first, second, plain]).await.unwrap();
        let an_hour_ago = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(count_unlinked_spans(db.pool(), an_hour_ago).await.unwrap(), 0);

        sqlx::query("UPDATE spans SET ingested_at = ? WHERE span_id = '0000000000000001'")
            .bind(to_nanos(&(Utc::now() - chrono::Duration::hours(2)), "ingested_at").unwrap())
            .execute(db.pool())
            .await
            .unwrap();
        assert_eq!(count_unlinked_spans(db.pool(), an_hour_ago).await.unwrap(), 1);

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(count_unlinked_spans(db.pool(), later).await.unwrap(), 2);

        link_test_result(db.pool(), &key, "result").await.unwrap();
        assert_eq!(count_unlinked_spans(db.pool(), later).await.unwrap(), 0);
    }
}
