//! `approval` node activity — dispatches a human-in-the-loop approval request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct ApprovalConfig {
    description: String,
    #[serde(default)]
    approvers: Vec<String>,
    #[serde(default)]
    approver_email: Option<String>,
    #[serde(default)]
    channels: Vec<String>,
    #[serde(default = "default_approval_type")]
    approval_type: String,
    #[serde(default)]
    timeout_hours: Option<f64>,
}

fn default_approval_type() -> String {
    "any".to_string()
}

pub struct ApprovalNode;

#[async_trait]
impl ExecutableNode for ApprovalNode {
    async fn execute(&self, input: Value, config: &Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: ApprovalConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid approval config: {e}")))?;

        let total_approvers = if !config.approvers.is_empty() {
            config.approvers.len() as i32
        } else if config.approver_email.is_some() {
            1
        } else {
            1
        };

        // node_id is threaded in via `input._node_id` by the interpreter (the
        // executor itself has no notion of its own node id otherwise).
        let node_id = input
            .get("_node_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let slot = db::repository::approvals::create_approval(
            &ctx.db,
            ctx.execution_id,
            &node_id,
            &config.approval_type,
            total_approvers,
        )
        .await
        .map_err(|e| NodeError::Retryable(format!("failed to create approval slot: {e}")))?;

        ctx.events
            .publish(
                "approval.requested",
                Some(ctx.workflow_id),
                Some(ctx.execution_id),
                Some(&node_id),
                json!({
                    "workflow_id": ctx.workflow_id,
                    "execution_id": ctx.execution_id,
                    "approval_id": slot.id,
                    "description": config.description,
                    "context": input,
                }),
            )
            .await
            .map_err(|e| NodeError::Retryable(format!("failed to publish approval.requested: {e}")))?;

        if !config.channels.is_empty() {
            // External notification delivery (Slack/email) is an out-of-scope
            // collaborator; this logs the intent rather than sending anything.
            warn!(channels = ?config.channels, approval_id = %slot.id, "external approval notification not implemented, logging only");
        }

        Ok(json!({
            "approval_id": slot.id,
            "status": "pending",
            "approval_type": config.approval_type,
            "timeout_hours": config.timeout_hours,
        }))
    }
}
