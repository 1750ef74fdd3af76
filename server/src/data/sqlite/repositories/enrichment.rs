//! Trace enrichment repository

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::TraceEnrichment;
use super::to_nanos;
use crate::utils::time::nanos_i64_to_datetime;

pub async fn upsert_trace_enrichment(
    pool: &SqlitePool,
    enrichment: &TraceEnrichment,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"INSERT INTO trace_enrichments
               (project_id, trace_id, span_count, root_count, error_count, root_span_name,
                start_time, end_time, duration_ms, test_result_id, enriched_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(project_id, trace_id) DO UPDATE SET
               span_count = excluded.span_count,
               root_count = excluded.root_count,
               error_count = excluded.error_count,
               root_span_name = excluded.root_span_name,
               start_time = excluded.start_time,
               end_time = excluded.end_time,
               duration_ms = excluded.duration_ms,
               test_result_id = excluded.test_result_id,
               enriched_at = excluded.enriched_at"#,
    )
    .bind(&enrichment.project_id)
    .bind(&enrichment.trace_id)
    .bind(enrichment.span_count)
    .bind(enrichment.root_count)
    .bind(enrichment.error_count)
    .bind(&enrichment.root_span_name)
    .bind(to_nanos(&enrichment.start_time, "start_time")?)
    .bind(to_nanos(&enrichment.end_time, "end_time")?)
    .bind(enrichment.duration_ms)
    .bind(&enrichment.test_result_id)
    .bind(to_nanos(&enrichment.enriched_at, "enriched_at")?)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_trace_enrichment(
    pool: &SqlitePool,
    project_id: &str,
    trace_id: &str,
) -> Result<Option<TraceEnrichment>, SqliteError> {
    let row = sqlx::query_as::<
        _,
        (
            String,
            String,
            i64,
            i64,
            i64,
            Option<String>,
            i64,
            i64,
            i64,
            Option<String>,
            i64,
        ),
    >(
        r#"SELECT project_id, trace_id, span_count, root_count, error_count, root_span_name,
                  start_time, end_time, duration_ms, test_result_id, enriched_at
           FROM trace_enrichments WHERE project_id = ? AND trace_id = ?"#,
    )
    .bind(project_id)
    .bind(trace_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(
            project_id,
            trace_id,
            span_count,
            root_count,
            error_count,
            root_span_name,
            start_time,
            end_time,
            duration_ms,
            test_result_id,
            enriched_at,
        )| TraceEnrichment {
            project_id,
            trace_id,
            span_count,
            root_count,
            error_count,
            root_span_name,
            start_time: nanos_i64_to_datetime(start_time),
            end_time: nanos_i64_to_datetime(end_time),
            duration_ms,
            test_result_id,
            enriched_at: nanos_i64_to_datetime(enriched_at),
        },
    ))
}
