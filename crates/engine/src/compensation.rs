//! Saga-style compensation coordinator (§4.6).
//!
//! Runs reverse handlers for every `status=success` history entry, newest
//! first. A per-node compensation failure is recorded but does not abort the
//! rest of the rollback.

use db::DbPool;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{context::HistoryStatus, models::NodeType, ExecutionContext};

pub struct CompensationCoordinator {
    http_client: reqwest::Client,
}

impl CompensationCoordinator {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Walk `ctx.history` in reverse, compensating every successful node.
    pub async fn compensate(
        &self,
        pool: &DbPool,
        events: &events::EventBus,
        workflow_id: Uuid,
        execution_id: Uuid,
        def_nodes: &[crate::models::Node],
        ctx: &ExecutionContext,
    ) {
        let _ = events
            .publish(
                "compensation.started",
                Some(workflow_id),
                Some(execution_id),
                None,
                json!({"workflow_id": workflow_id, "execution_id": execution_id}),
            )
            .await;

        let successful: Vec<&str> = ctx
            .history
            .iter()
            .rev()
            .filter(|e| matches!(e.status, HistoryStatus::Success))
            .map(|e| e.node_id.as_str())
            .collect();

        for node_id in successful {
            let Some(node) = def_nodes.iter().find(|n| n.id == node_id) else {
                continue;
            };

            let log = match db::repository::compensation::create_compensation(
                pool,
                execution_id,
                node_id,
                json!({}),
            )
            .await
            {
                Ok(log) => log,
                Err(e) => {
                    tracing::warn!(node_id, error = %e, "failed to create compensation log row");
                    continue;
                }
            };

            let result = self.compensate_node(node, ctx).await;

            let (status, error) = match &result {
                Ok(()) => ("success", None),
                Err(message) => ("failed", Some(message.as_str())),
            };

            let _ = db::repository::compensation::finish_compensation(
                pool,
                log.id,
                status,
                json!({}),
                error,
            )
            .await;

            let event_type = if result.is_ok() { "compensation.completed" } else { "compensation.failed" };
            let _ = events
                .publish(
                    event_type,
                    Some(workflow_id),
                    Some(execution_id),
                    Some(node_id),
                    json!({
                        "workflow_id": workflow_id,
                        "execution_id": execution_id,
                        "node_id": node_id,
                        "error": error,
                    }),
                )
                .await;
        }

        let _ = db::repository::executions::set_compensation_status(pool, execution_id, "completed").await;
    }

    async fn compensate_node(&self, node: &crate::models::Node, ctx: &ExecutionContext) -> Result<(), String> {
        match node.node_type {
            NodeType::Agent => {
                if let Some(url) = node.config.get("cleanup_url").and_then(Value::as_str) {
                    let context = ctx.mapped_outputs.get(&node.id).map(|o| o.header.raw.clone());
                    self.http_client
                        .post(url)
                        .json(&json!({"action": "compensate", "state": context}))
                        .send()
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            NodeType::ApiCall => {
                let Some(url) = node.config.get("url").and_then(Value::as_str) else {
                    return Ok(());
                };
                let method = node
                    .config
                    .get("compensation_method")
                    .and_then(Value::as_str)
                    .unwrap_or("DELETE");
                let reqwest_method = method
                    .parse::<reqwest::Method>()
                    .map_err(|e| format!("invalid compensation_method '{method}': {e}"))?;
                let state = ctx.mapped_outputs.get(&node.id).map(|o| o.header.raw.clone());
                self.http_client
                    .request(reqwest_method, url)
                    .json(&json!({"action": "compensate", "state": state}))
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            }
            NodeType::Approval => Ok(()),
            NodeType::Eval
            | NodeType::Conditional
            | NodeType::Merge
            | NodeType::Timer
            | NodeType::Trigger
            | NodeType::Event
            | NodeType::End => Ok(()),
        }
    }
}
