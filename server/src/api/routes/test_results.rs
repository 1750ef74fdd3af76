//! Test-framework hooks: record executions and results, then link their spans

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::types::ApiError;
use crate::data::TraceRepository;
use crate::data::types::{TestExecutionKey, TestExecutionRow};
use crate::domain::linking::{TraceResultLinker, canonical_key};
use crate::utils::ids::canonical_uuid;

#[derive(Clone)]
pub struct HookState {
    pub repo: Arc<dyn TraceRepository>,
    pub linker: Arc<TraceResultLinker>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTestExecutionRequest {
    pub test_run_id: String,
    pub test_id: String,
    pub test_configuration_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordTestResultRequest {
    pub test_run_id: String,
    pub test_id: String,
    pub test_configuration_id: String,
    pub test_result_id: String,
}

#[derive(Debug, Serialize)]
pub struct RecordTestResultResponse {
    /// Result id actually stored; an earlier result is never replaced
    pub test_result_id: String,
    pub linked: u64,
}

pub fn routes(state: HookState) -> Router {
    Router::new()
        .route("/test-executions", post(create_test_execution))
        .route("/test-results", post(record_test_result))
        .with_state(state)
}

fn parse_key(run: &str, test: &str, config: &str) -> Result<TestExecutionKey, ApiError> {
    canonical_key(run, test, config).ok_or_else(|| {
        ApiError::bad_request(
            "INVALID_CORRELATION_ID",
            "test_run_id, test_id and test_configuration_id must be UUIDs",
        )
    })
}

async fn create_test_execution(
    State(state): State<HookState>,
    Json(req): Json<CreateTestExecutionRequest>,
) -> Result<(StatusCode, Json<TestExecutionRow>), ApiError> {
    let key = parse_key(&req.test_run_id, &req.test_id, &req.test_configuration_id)?;
    let row = state
        .repo
        .create_test_execution(&key)
        .await
        .map_err(ApiError::from_data)?;
    Ok((StatusCode::CREATED, Json(row)))
}

async fn record_test_result(
    State(state): State<HookState>,
    Json(req): Json<RecordTestResultRequest>,
) -> Result<Json<RecordTestResultResponse>, ApiError> {
    let key = parse_key(&req.test_run_id, &req.test_id, &req.test_configuration_id)?;
    let result_id = canonical_uuid(&req.test_result_id).ok_or_else(|| {
        ApiError::bad_request("INVALID_TEST_RESULT_ID", "test_result_id must be a UUID")
    })?;

    let row = state
        .repo
        .record_test_result(&key, &result_id)
        .await
        .map_err(ApiError::from_data)?;
    let stored = row
        .test_result_id
        .ok_or_else(|| ApiError::internal("Test result was not stored"))?;
    if stored != result_id {
        tracing::warn!(
            test_run_id = %key.test_run_id,
            test_id = %key.test_id,
            existing = %stored,
            rejected = %result_id,
            "Test execution already has a result, keeping the existing one"
        );
    }

    let outcome = state
        .linker
        .link_for_result_created(
            &key.test_run_id,
            &key.test_id,
            &key.test_configuration_id,
            &stored,
        )
        .await;

    Ok(Json(RecordTestResultResponse {
        test_result_id: stored,
        linked: outcome.count(),
    }))
}
