//! Trace read API: span trees rebuilt from stored spans on every request
//!
//! Trees are rendered as flat rows in depth-first display order. Each row
//! carries its depth and child ids, so a trace of any depth renders without
//! nesting the JSON.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::types::ApiError;
use crate::data::TraceRepository;
use crate::data::types::Span;
use crate::domain::traces::{SpanForest, SpanTreeBuilder, SpanTreeNode};
use crate::utils::ids::{is_valid_project_id, is_valid_span_id, is_valid_trace_id};

#[derive(Debug, Serialize)]
pub struct SpanRow<'a> {
    #[serde(flatten)]
    pub span: &'a Span,
    pub depth: usize,
    pub children: Vec<&'a str>,
}

impl<'a> From<SpanTreeNode<'a>> for SpanRow<'a> {
    fn from(node: SpanTreeNode<'a>) -> Self {
        Self {
            span: node.span(),
            depth: node.depth(),
            children: node.children().map(|c| c.span().span_id.as_str()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TraceTreeResponse<'a> {
    pub trace_id: &'a str,
    pub span_count: usize,
    /// Root span ids, ordered by start time
    pub roots: Vec<&'a str>,
    pub spans: Vec<SpanRow<'a>>,
}

#[derive(Debug, Serialize)]
pub struct SpanSubtreeResponse<'a> {
    #[serde(flatten)]
    pub node: SpanRow<'a>,
    pub subtree_size: usize,
    /// Everything below this span, in display order
    pub descendants: Vec<SpanRow<'a>>,
}

pub fn routes(repo: Arc<dyn TraceRepository>) -> Router {
    Router::new()
        .route(
            "/projects/{project_id}/traces/{trace_id}/tree",
            get(get_trace_tree),
        )
        .route(
            "/projects/{project_id}/traces/{trace_id}/spans/{span_id}",
            get(get_span),
        )
        .with_state(repo)
}

async fn load_forest(
    repo: &dyn TraceRepository,
    project_id: &str,
    trace_id: &str,
) -> Result<SpanForest, ApiError> {
    if !is_valid_project_id(project_id) {
        return Err(ApiError::bad_request("INVALID_PROJECT_ID", "Invalid project_id"));
    }
    // Stored ids are lowercase hex
    if !is_valid_trace_id(trace_id) {
        return Err(ApiError::bad_request("INVALID_TRACE_ID", "Invalid trace_id"));
    }

    let spans = repo
        .get_trace_spans(project_id, trace_id)
        .await
        .map_err(ApiError::from_data)?;
    if spans.is_empty() {
        return Err(ApiError::not_found("TRACE_NOT_FOUND", "Trace not found"));
    }
    Ok(SpanTreeBuilder::build(spans))
}

async fn get_trace_tree(
    State(repo): State<Arc<dyn TraceRepository>>,
    Path((project_id, trace_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let forest = load_forest(repo.as_ref(), &project_id, &trace_id).await?;
    let body = TraceTreeResponse {
        trace_id: &trace_id,
        span_count: SpanTreeBuilder::count(&forest),
        roots: forest.roots().map(|r| r.span().span_id.as_str()).collect(),
        spans: forest.preorder().into_iter().map(SpanRow::from).collect(),
    };
    Ok(Json(body).into_response())
}

async fn get_span(
    State(repo): State<Arc<dyn TraceRepository>>,
    Path((project_id, trace_id, span_id)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    if !is_valid_span_id(&span_id) {
        return Err(ApiError::bad_request("INVALID_SPAN_ID", "Invalid span_id"));
    }
    let forest = load_forest(repo.as_ref(), &project_id, &trace_id).await?;
    let node = SpanTreeBuilder::find(&forest, &span_id)
        .ok_or_else(|| ApiError::not_found("SPAN_NOT_FOUND", "Span not found"))?;

    let mut subtree = node.descendants().into_iter().map(SpanRow::from);
    let Some(head) = subtree.next() else {
        return Err(ApiError::internal("Span subtree is empty"));
    };
    let descendants: Vec<SpanRow<'_>> = subtree.collect();
    let body = SpanSubtreeResponse {
        node: head,
        subtree_size: descendants.len() + 1,
        descendants,
    };
    Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use serde_json::{Map, Value};
    use tower::ServiceExt;

    use crate::data::SqliteService;
    use crate::data::types::{Span, SpanKind, StatusCode as SpanStatus};

    const TRACE: &str = "0af7651916cd43dd8448eb211c80319c";

    fn span(span_id: &str, parent: Option<&str>, offset_ms: i64) -> Span {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap()
            + chrono::Duration::milliseconds(offset_ms);
        Span {
            trace_id: TRACE.into(),
            span_id: span_id.into(),
            parent_span_id: parent.map(Into::into),
            project_id: "default".into(),
            environment: "development".into(),
            span_name: "function.step".into(),
            span_kind: SpanKind::Internal,
            start_time: start,
            end_time: start + chrono::Duration::milliseconds(10),
            status_code: SpanStatus::Ok,
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

    async fn app() -> Router {
        let db = SqliteService::open_in_memory().await.unwrap();
        db.insert_spans(&[
            span("00f067aa0ba902b7", None, 0),
            span("00f067aa0ba902b8", Some("00f067aa0ba902b7"), 1),
            span("00f067aa0ba902b9", Some("00f067aa0ba902b8"), 2),
        ])
        .await
        .unwrap();
        routes(Arc::new(db))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_tree_rows_in_display_order() {
        let uri = format!("/projects/default/traces/{TRACE}/tree");
        let (status, body) = get_json(app().await, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trace_id"], TRACE);
        assert_eq!(body["span_count"], 3);
        assert_eq!(body["roots"], serde_json::json!(["00f067aa0ba902b7"]));

        let rows = body["spans"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["span_id"], "00f067aa0ba902b9");
        assert_eq!(rows[2]["depth"], 2);
        assert_eq!(rows[0]["children"], serde_json::json!(["00f067aa0ba902b8"]));
        assert_eq!(rows[0]["span_name"], "function.step");
    }

    #[tokio::test]
    async fn test_span_lookup() {
        let uri = format!("/projects/default/traces/{TRACE}/spans/00f067aa0ba902b8");
        let (status, body) = get_json(app().await, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["span_id"], "00f067aa0ba902b8");
        assert_eq!(body["depth"], 1);
        assert_eq!(body["children"].as_array().unwrap().len(), 1);
        assert_eq!(body["subtree_size"], 2);
        assert_eq!(body["descendants"][0]["span_id"], "00f067aa0ba902b9");

        let uri = format!("/projects/default/traces/{TRACE}/spans/1111111111111111");
        let (status, body) = get_json(app().await, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SPAN_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_deep_trace_renders() {
        const DEPTH: usize = 20_000;
        let db = SqliteService::open_in_memory().await.unwrap();
        let spans: Vec<Span> = (1..=DEPTH)
            .map(|i| {
                let parent = (i > 1).then(|| format!("{:016x}", i - 1));
                span(&format!("{i:016x}"), parent.as_deref(), i as i64)
            })
            .collect();
        db.insert_spans(&spans).await.unwrap();
        let app = routes(Arc::new(db));

        let uri = format!("/projects/default/traces/{TRACE}/tree");
        let (status, body) = get_json(app.clone(), &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["span_count"], DEPTH);
        assert_eq!(body["spans"][DEPTH - 1]["depth"], DEPTH - 1);

        let uri = format!("/projects/default/traces/{TRACE}/spans/{:016x}", 1);
        let (status, body) = get_json(app, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subtree_size"], DEPTH);
    }

    #[tokio::test]
    async fn test_unknown_trace_is_404() {
        let uri = format!("/projects/other/traces/{TRACE}/tree");
        let (status, _) = get_json(app().await, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_trace_id_is_400() {
        let (status, body) = get_json(app().await, "/projects/default/traces/xyz/tree").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_TRACE_ID");
    }
}
