//! Durable event-log repository functions.
//!
//! Backs the `events` crate's ring-buffer replay; retention trimming is done
//! here rather than in `events` so the bound is enforced transactionally
//! alongside the insert.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::EventLogRow, DbError};

/// Append an event record and trim the corresponding stream to `retention`
/// rows, oldest first — the ring-buffer semantics described in the event
/// fabric's publish contract.
pub async fn append_event(
    pool: &PgPool,
    workflow_id: Option<Uuid>,
    execution_id: Option<Uuid>,
    node_id: Option<&str>,
    event_type: &str,
    event_data: serde_json::Value,
    retention: i64,
) -> Result<EventLogRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        EventLogRow,
        r#"
        INSERT INTO event_logs (id, workflow_id, execution_id, node_id, event_type, event_data, timestamp)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, workflow_id, execution_id, node_id, event_type, event_data, timestamp
        "#,
        id,
        workflow_id,
        execution_id,
        node_id,
        event_type,
        event_data,
        now,
    )
    .fetch_one(pool)
    .await?;

    if let Some(execution_id) = execution_id {
        trim_execution_stream(pool, execution_id, retention).await?;
    }

    Ok(row)
}

async fn trim_execution_stream(pool: &PgPool, execution_id: Uuid, retention: i64) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        DELETE FROM event_logs
        WHERE execution_id = $1
          AND id NOT IN (
              SELECT id FROM event_logs
              WHERE execution_id = $1
              ORDER BY timestamp DESC
              LIMIT $2
          )
        "#,
        execution_id,
        retention,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Replay a workflow's event stream, oldest first, optionally from a cursor.
pub async fn replay_workflow_stream(
    pool: &PgPool,
    workflow_id: Uuid,
    from_timestamp: Option<DateTime<Utc>>,
) -> Result<Vec<EventLogRow>, DbError> {
    let rows = sqlx::query_as!(
        EventLogRow,
        r#"
        SELECT id, workflow_id, execution_id, node_id, event_type, event_data, timestamp
        FROM event_logs
        WHERE workflow_id = $1 AND ($2::timestamptz IS NULL OR timestamp >= $2)
        ORDER BY timestamp ASC
        "#,
        workflow_id,
        from_timestamp,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Replay an execution's event stream, oldest first, optionally from a cursor.
pub async fn replay_execution_stream(
    pool: &PgPool,
    execution_id: Uuid,
    from_timestamp: Option<DateTime<Utc>>,
) -> Result<Vec<EventLogRow>, DbError> {
    let rows = sqlx::query_as!(
        EventLogRow,
        r#"
        SELECT id, workflow_id, execution_id, node_id, event_type, event_data, timestamp
        FROM event_logs
        WHERE execution_id = $1 AND ($2::timestamptz IS NULL OR timestamp >= $2)
        ORDER BY timestamp ASC
        "#,
        execution_id,
        from_timestamp,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
