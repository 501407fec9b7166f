use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use engine::WorkflowDefinition;
use serde_json::Value;
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

#[derive(serde::Deserialize)]
pub struct ExecuteWorkflowDto {
    #[serde(default)]
    pub input: Value,
}

/// `POST /api/v1/workflows/:id/execute` — creates the execution row and
/// enqueues a `start` job; the queue worker drives it to its first
/// suspension point out-of-band.
pub async fn execute(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<ExecuteWorkflowDto>,
) -> ApiResult<(StatusCode, Json<db::models::WorkflowExecutionRow>)> {
    let workflow = db::repository::workflows::get_workflow(&state.pool, workflow_id).await?;
    let def: WorkflowDefinition = serde_json::from_value(workflow.definition)
        .map_err(|e| crate::error::ApiError::BadRequest(format!("stored workflow definition is invalid: {e}")))?;
    engine::validate(&def)?;

    let row = db::repository::executions::create_execution(&state.pool, workflow_id, payload.input.clone()).await?;
    queue::enqueue_start(&state.pool, row.id, workflow_id, payload.input).await?;

    Ok((StatusCode::ACCEPTED, Json(row)))
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<db::models::WorkflowExecutionRow>> {
    Ok(Json(db::repository::executions::get_execution(&state.pool, id).await?))
}

pub async fn pause(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.interpreter().pause(id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /api/v1/executions/:id/resume` — enqueues a `resume` job rather
/// than driving inline, so the HTTP response doesn't block on however many
/// nodes the interpreter runs through before its next suspension point.
pub async fn resume(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    let row = db::repository::executions::get_execution(&state.pool, id).await?;
    db::repository::executions::set_paused(&state.pool, id, false).await?;
    queue::enqueue_resume(&state.pool, id, row.workflow_id).await?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(serde::Deserialize, Default)]
pub struct CancelDto {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub compensate: bool,
}

pub async fn cancel(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    body: Option<Json<CancelDto>>,
) -> ApiResult<StatusCode> {
    let dto = body.map(|Json(b)| b).unwrap_or_default();
    state.interpreter().cancel(id, dto.reason.as_deref(), dto.compensate).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn list_node_executions(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<db::models::NodeExecutionRow>>> {
    Ok(Json(db::repository::executions::list_node_executions(&state.pool, id).await?))
}

#[derive(serde::Deserialize)]
pub struct EventsQuery {
    pub since: Option<DateTime<Utc>>,
}

pub async fn events(
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<events::EventRecord>>> {
    let records = state
        .events
        .replay_execution(id, query.since)
        .await
        .map_err(|e| crate::error::ApiError::Engine(engine::EngineError::Events(e)))?;
    Ok(Json(records))
}
