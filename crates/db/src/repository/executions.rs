//! Execution and node-execution repository functions.
//!
//! A `workflow_executions` row is the durable backing store for the
//! interpreter's `ExecutionContext`: `context_snapshot` carries the full
//! serialized context (node outputs, mapped outputs, history, pending
//! approval) so that `Interpreter::resume` can reconstruct identical state
//! after a process restart without replaying every node execution.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    models::{NodeExecutionRow, WorkflowExecutionRow},
    DbError,
};

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Create a new workflow execution record in `running` status.
pub async fn create_execution(
    pool: &PgPool,
    workflow_id: Uuid,
    input: serde_json::Value,
) -> Result<WorkflowExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let empty_snapshot = serde_json::json!({});

    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        INSERT INTO workflow_executions
            (id, workflow_id, status, input, output, current_node, error,
             retry_count, failure_reason, compensation_status, paused,
             context_snapshot, started_at, completed_at)
        VALUES ($1, $2, 'running', $3, NULL, NULL, NULL, 0, NULL, NULL, false, $4, $5, NULL)
        RETURNING id, workflow_id, status, input, output, current_node, error,
                  retry_count, failure_reason, compensation_status, paused,
                  context_snapshot, started_at, completed_at
        "#,
        id,
        workflow_id,
        input,
        empty_snapshot,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single execution by its primary key.
pub async fn get_execution(pool: &PgPool, execution_id: Uuid) -> Result<WorkflowExecutionRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        SELECT id, workflow_id, status, input, output, current_node, error,
               retry_count, failure_reason, compensation_status, paused,
               context_snapshot, started_at, completed_at
        FROM workflow_executions WHERE id = $1
        "#,
        execution_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Persist the interpreter's in-progress snapshot after a step — the core
/// durability checkpoint hit at every suspension point.
pub async fn save_checkpoint(
    pool: &PgPool,
    execution_id: Uuid,
    current_node: Option<&str>,
    paused: bool,
    context_snapshot: serde_json::Value,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE workflow_executions
        SET current_node = $1, paused = $2, context_snapshot = $3
        WHERE id = $4
        "#,
        current_node,
        paused,
        context_snapshot,
        execution_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Finalize an execution with a terminal status (`completed`, `failed`, `canceled`).
pub async fn finalize_execution(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
    output: Option<serde_json::Value>,
    error: Option<&str>,
    failure_reason: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE workflow_executions
        SET status = $1, output = $2, error = $3, failure_reason = $4, completed_at = $5
        WHERE id = $6
        "#,
        status,
        output,
        error,
        failure_reason,
        Utc::now(),
        execution_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Flip the `paused` flag without otherwise touching execution state.
pub async fn set_paused(pool: &PgPool, execution_id: Uuid, paused: bool) -> Result<(), DbError> {
    sqlx::query!(
        "UPDATE workflow_executions SET paused = $1 WHERE id = $2",
        paused,
        execution_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a compensation-phase status on the execution row (`pending`, `success`, `failed`).
pub async fn set_compensation_status(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
) -> Result<(), DbError> {
    sqlx::query!(
        "UPDATE workflow_executions SET compensation_status = $1 WHERE id = $2",
        status,
        execution_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Increment the execution's retry counter (used by the eval `on_failure=retry` path).
pub async fn increment_retry_count(pool: &PgPool, execution_id: Uuid) -> Result<i32, DbError> {
    let row = sqlx::query!(
        r#"
        UPDATE workflow_executions
        SET retry_count = retry_count + 1
        WHERE id = $1
        RETURNING retry_count
        "#,
        execution_id,
    )
    .fetch_one(pool)
    .await?;

    Ok(row.retry_count)
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// Insert a pending/running history entry for a node (step 4 of the interpreter loop).
pub async fn start_node_execution(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    node_type: &str,
    input: serde_json::Value,
    is_fallback: bool,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, execution_id, node_id, node_type, input, output, status, is_fallback, started_at, finished_at)
        VALUES ($1, $2, $3, $4, $5, NULL, 'running', $6, $7, NULL)
        RETURNING id, execution_id, node_id, node_type, input, output, status, is_fallback, started_at, finished_at
        "#,
        id,
        execution_id,
        node_id,
        node_type,
        input,
        is_fallback,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Mark a history entry as finished (`success`, `failed`).
pub async fn finish_node_execution(
    pool: &PgPool,
    node_execution_id: Uuid,
    status: &str,
    output: Option<serde_json::Value>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions
        SET status = $1, output = $2, finished_at = $3
        WHERE id = $4
        "#,
        status,
        output,
        Utc::now(),
        node_execution_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Return the full execution history, oldest first.
pub async fn list_node_executions(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        SELECT id, execution_id, node_id, node_type, input, output, status, is_fallback, started_at, finished_at
        FROM node_executions
        WHERE execution_id = $1
        ORDER BY started_at ASC
        "#,
        execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
