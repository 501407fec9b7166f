//! Compensation-log repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::CompensationLogRow, DbError};

/// Record a `pending` compensation attempt for a node.
pub async fn create_compensation(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    data: serde_json::Value,
) -> Result<CompensationLogRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        CompensationLogRow,
        r#"
        INSERT INTO compensation_logs (id, execution_id, node_id, status, data, error, created_at, completed_at)
        VALUES ($1, $2, $3, 'pending', $4, NULL, $5, NULL)
        RETURNING id, execution_id, node_id, status, data, error, created_at, completed_at
        "#,
        id,
        execution_id,
        node_id,
        data,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Mark a compensation attempt as finished (`success` or `failed`).
pub async fn finish_compensation(
    pool: &PgPool,
    compensation_id: Uuid,
    status: &str,
    data: serde_json::Value,
    error: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE compensation_logs
        SET status = $1, data = $2, error = $3, completed_at = $4
        WHERE id = $5
        "#,
        status,
        data,
        error,
        Utc::now(),
        compensation_id,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Return every compensation attempt made for an execution, oldest first.
pub async fn list_compensations(
    pool: &PgPool,
    execution_id: Uuid,
) -> Result<Vec<CompensationLogRow>, DbError> {
    let rows = sqlx::query_as!(
        CompensationLogRow,
        r#"
        SELECT id, execution_id, node_id, status, data, error, created_at, completed_at
        FROM compensation_logs
        WHERE execution_id = $1
        ORDER BY created_at ASC
        "#,
        execution_id,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
