//! Agent reliability scoring and reroute decisions (§4.5).

use db::{repository::agent_scores, DbPool};

use crate::error::EngineError;

/// Record the outcome of one `agent` node execution into its `AgentScore` row.
pub async fn record_agent_execution(
    pool: &DbPool,
    provider: &str,
    agent_id: &str,
    succeeded: bool,
    latency_ms: f64,
    cost: f64,
) -> Result<(), EngineError> {
    agent_scores::record_execution(pool, provider, agent_id, succeeded, latency_ms, cost).await?;
    Ok(())
}

/// `reliability < 0.5 ∧ execution_count ≥ 3`.
pub async fn should_reroute(pool: &DbPool, provider: &str, agent_id: &str) -> Result<bool, EngineError> {
    let score = agent_scores::get_score(pool, provider, agent_id).await?;
    Ok(match score {
        Some(s) => s.reliability_score < 0.5 && s.execution_count >= 3,
        None => false,
    })
}

/// Candidate with the highest `reliability_score`, ties broken by lowest
/// `avg_latency_ms`. Candidates with no recorded row default to 1.0 so
/// untried agents are preferred over a worse-than-coinflip track record.
pub async fn get_best_agent(
    pool: &DbPool,
    provider: &str,
    candidates: &[String],
) -> Result<Option<String>, EngineError> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut best: Option<(String, f64, f64)> = None;
    for candidate in candidates {
        let (reliability, latency) = match agent_scores::get_score(pool, provider, candidate).await? {
            Some(s) => (s.reliability_score, s.avg_latency_ms),
            None => (1.0, 0.0),
        };
        best = match best {
            None => Some((candidate.clone(), reliability, latency)),
            Some((_, best_rel, best_lat))
                if reliability > best_rel || (reliability == best_rel && latency < best_lat) =>
            {
                Some((candidate.clone(), reliability, latency))
            }
            other => other,
        };
    }

    Ok(best.map(|(id, _, _)| id))
}

/// `get_best_agent` over `all` excluding the agent that just failed.
pub async fn get_alternate_agent(
    pool: &DbPool,
    provider: &str,
    failed_id: &str,
    all: &[String],
) -> Result<Option<String>, EngineError> {
    let candidates: Vec<String> = all.iter().filter(|id| id.as_str() != failed_id).cloned().collect();
    get_best_agent(pool, provider, &candidates).await
}
