use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{error::ApiResult, AppState};

#[derive(serde::Deserialize)]
pub struct RespondDto {
    /// `"approve"` or `"reject"`.
    pub action: String,
    #[serde(default)]
    pub approver: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// `POST /api/v1/approvals/:id/respond` — appends the response and enqueues
/// a `signal` job so resolution (and the interpreter drive that follows) runs
/// on the worker rather than blocking this request.
pub async fn respond(
    Path(approval_id): Path<Uuid>,
    State(state): State<AppState>,
    Json(dto): Json<RespondDto>,
) -> ApiResult<StatusCode> {
    let approval = db::repository::approvals::get_approval(&state.pool, approval_id).await?;
    let execution = db::repository::executions::get_execution(&state.pool, approval.execution_id).await?;

    queue::enqueue_signal(
        &state.pool,
        approval.execution_id,
        execution.workflow_id,
        &dto.action,
        dto.approver,
        dto.comment,
    )
    .await?;

    Ok(StatusCode::ACCEPTED)
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> ApiResult<Json<db::models::ApprovalRequestRow>> {
    Ok(Json(db::repository::approvals::get_approval(&state.pool, id).await?))
}
