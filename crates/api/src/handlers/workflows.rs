use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use db::repository::workflows as wf_repo;
use engine::WorkflowDefinition;
use serde_json::Value;
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

#[derive(serde::Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: Value,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<db::models::WorkflowRow>>> {
    Ok(Json(wf_repo::list_workflows(&state.pool).await?))
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<db::models::WorkflowRow>> {
    Ok(Json(wf_repo::get_workflow(&state.pool, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> ApiResult<(StatusCode, Json<db::models::WorkflowRow>)> {
    // The definition's `id`/`created_at`/`updated_at` are assigned by the
    // row insert, not by the client — re-parse against a shape that ignores
    // them, then validate structurally before persisting.
    let candidate = WorkflowDefinition {
        id: Uuid::nil(),
        name: payload.name.clone(),
        description: payload.description.clone(),
        nodes: serde_json::from_value(
            payload.definition.get("nodes").cloned().unwrap_or(Value::Array(vec![])),
        )
        .map_err(|e| crate::error::ApiError::BadRequest(format!("invalid nodes: {e}")))?,
        edges: serde_json::from_value(
            payload.definition.get("edges").cloned().unwrap_or(Value::Array(vec![])),
        )
        .map_err(|e| crate::error::ApiError::BadRequest(format!("invalid edges: {e}")))?,
        is_template: payload.is_template,
        session_id: payload.session_id.clone(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    engine::validate(&candidate)?;

    let row = wf_repo::create_workflow(
        &state.pool,
        &payload.name,
        payload.description.as_deref(),
        payload.definition,
        payload.is_template,
        payload.session_id.as_deref(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn delete(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<StatusCode> {
    wf_repo::delete_workflow(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
