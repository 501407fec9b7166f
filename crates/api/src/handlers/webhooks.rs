use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use engine::{NodeType, WorkflowDefinition};
use serde_json::Value;

use crate::{error::ApiResult, AppState};

/// `POST /webhook/:path` — finds the workflow whose `trigger` node is
/// configured `type=webhook` with a matching `webhook_url`, then starts it.
pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let workflows = db::repository::workflows::list_workflows(&state.pool).await?;

    let matched = workflows.into_iter().find_map(|row| {
        let def: WorkflowDefinition = serde_json::from_value(row.definition).ok()?;
        def.nodes.iter().find(|n| {
            n.node_type == NodeType::Trigger
                && n.config.get("type").and_then(Value::as_str) == Some("webhook")
                && n.config.get("webhook_url").and_then(Value::as_str) == Some(path.as_str())
        })?;
        Some(def)
    });

    let Some(def) = matched else {
        return Err(crate::error::ApiError::NotFound);
    };

    let row = db::repository::executions::create_execution(&state.pool, def.id, payload.clone()).await?;
    queue::enqueue_start(&state.pool, row.id, def.id, payload).await?;

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"execution_id": row.id}))))
}
