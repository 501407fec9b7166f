//! Approval slot repository functions.
//!
//! `responses` is stored as a JSON array so the REST layer can append without
//! a schema migration; resolution (majority/all/any) is computed by the
//! caller (`engine::selfhealing`'s sibling, the interpreter's approval
//! handling) and written back atomically with `resolve_approval`.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::ApprovalRequestRow, DbError};

/// Create a new `pending` approval slot.
pub async fn create_approval(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    approval_type: &str,
    total_approvers: i32,
) -> Result<ApprovalRequestRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let empty: serde_json::Value = serde_json::json!([]);

    let row = sqlx::query_as!(
        ApprovalRequestRow,
        r#"
        INSERT INTO approval_requests
            (id, execution_id, node_id, status, approval_type, total_approvers, responses, requested_at, resolved_at)
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, NULL)
        RETURNING id, execution_id, node_id, status, approval_type, total_approvers, responses, requested_at, resolved_at
        "#,
        id,
        execution_id,
        node_id,
        approval_type,
        total_approvers,
        empty,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch an approval slot by id.
pub async fn get_approval(pool: &PgPool, approval_id: Uuid) -> Result<ApprovalRequestRow, DbError> {
    let row = sqlx::query_as!(
        ApprovalRequestRow,
        r#"
        SELECT id, execution_id, node_id, status, approval_type, total_approvers, responses, requested_at, resolved_at
        FROM approval_requests WHERE id = $1
        "#,
        approval_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Fetch the (at most one) pending approval slot for a node within an execution.
pub async fn get_pending_approval_for_node(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
) -> Result<Option<ApprovalRequestRow>, DbError> {
    let row = sqlx::query_as!(
        ApprovalRequestRow,
        r#"
        SELECT id, execution_id, node_id, status, approval_type, total_approvers, responses, requested_at, resolved_at
        FROM approval_requests
        WHERE execution_id = $1 AND node_id = $2 AND status = 'pending'
        ORDER BY requested_at DESC
        LIMIT 1
        "#,
        execution_id,
        node_id,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Append a single `{approver, action, comment, timestamp}` response, guarded
/// by `status = 'pending'` so a resolved slot silently rejects further
/// responses (invariant: once resolved, no further responses are accepted).
pub async fn append_response(
    pool: &PgPool,
    approval_id: Uuid,
    response: serde_json::Value,
) -> Result<ApprovalRequestRow, DbError> {
    let row = sqlx::query_as!(
        ApprovalRequestRow,
        r#"
        UPDATE approval_requests
        SET responses = responses || $1::jsonb
        WHERE id = $2 AND status = 'pending'
        RETURNING id, execution_id, node_id, status, approval_type, total_approvers, responses, requested_at, resolved_at
        "#,
        serde_json::Value::Array(vec![response]),
        approval_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Resolve an approval slot to `approved` or `rejected`. A no-op if already resolved.
pub async fn resolve_approval(
    pool: &PgPool,
    approval_id: Uuid,
    status: &str,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE approval_requests
        SET status = $1, resolved_at = $2
        WHERE id = $3 AND status = 'pending'
        "#,
        status,
        Utc::now(),
        approval_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}
