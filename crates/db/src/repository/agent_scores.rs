//! Agent reliability-score repository functions.
//!
//! Mirrors the read-modify-write pattern of the self-healing service this was
//! grounded on: a score row is created lazily on first execution and updated
//! in place on every subsequent one. `reliability_score` and `avg_latency_ms`
//! are always recomputed from the running counters rather than trusted as
//! independent inputs, so they can never drift.

use uuid::Uuid;
use sqlx::PgPool;

use crate::{models::AgentScoreRow, DbError};

/// Fetch an agent's score row, if one has been recorded yet.
pub async fn get_score(
    pool: &PgPool,
    provider: &str,
    agent_id: &str,
) -> Result<Option<AgentScoreRow>, DbError> {
    let row = sqlx::query_as!(
        AgentScoreRow,
        r#"
        SELECT id, provider, agent_id, execution_count, success_count, failure_count,
               avg_latency_ms, total_cost, reliability_score, last_updated
        FROM agent_scores WHERE provider = $1 AND agent_id = $2
        "#,
        provider,
        agent_id,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Return every recorded agent score, least reliable first — used to pick a
/// fallback candidate when the primary agent is rerouted.
pub async fn list_scores(pool: &PgPool) -> Result<Vec<AgentScoreRow>, DbError> {
    let rows = sqlx::query_as!(
        AgentScoreRow,
        r#"
        SELECT id, provider, agent_id, execution_count, success_count, failure_count,
               avg_latency_ms, total_cost, reliability_score, last_updated
        FROM agent_scores ORDER BY reliability_score ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Record the outcome of an agent execution, creating the row on first use.
///
/// `avg_latency_ms` is the running mean over `execution_count`; `total_cost`
/// accumulates; `reliability_score = success_count / execution_count`.
pub async fn record_execution(
    pool: &PgPool,
    provider: &str,
    agent_id: &str,
    succeeded: bool,
    latency_ms: f64,
    cost: f64,
) -> Result<AgentScoreRow, DbError> {
    let id = Uuid::new_v4();
    let success_inc = if succeeded { 1 } else { 0 };
    let failure_inc = if succeeded { 0 } else { 1 };

    let row = sqlx::query_as!(
        AgentScoreRow,
        r#"
        INSERT INTO agent_scores
            (id, provider, agent_id, execution_count, success_count, failure_count,
             avg_latency_ms, total_cost, reliability_score, last_updated)
        VALUES ($1, $2, $3, 1, $4, $5, $6, $7, $8, now())
        ON CONFLICT (provider, agent_id) DO UPDATE SET
            execution_count = agent_scores.execution_count + 1,
            success_count = agent_scores.success_count + $4,
            failure_count = agent_scores.failure_count + $5,
            avg_latency_ms = (agent_scores.avg_latency_ms * agent_scores.execution_count + $6)
                              / (agent_scores.execution_count + 1)::float8,
            total_cost = agent_scores.total_cost + $7,
            reliability_score = (agent_scores.success_count + $4)::float8
                                 / (agent_scores.execution_count + 1)::float8,
            last_updated = now()
        RETURNING id, provider, agent_id, execution_count, success_count, failure_count,
                  avg_latency_ms, total_cost, reliability_score, last_updated
        "#,
        id,
        provider,
        agent_id,
        success_inc,
        failure_inc,
        latency_ms,
        cost,
        success_inc as f64,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}
