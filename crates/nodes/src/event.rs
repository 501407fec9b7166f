//! `event` node activity — publishes the previous output onto a named channel.
//!
//! `subscribe` is an explicit non-goal: this core has no long-lived listener
//! infrastructure for workflow-defined channels, only the fixed lifecycle
//! event taxonomy the interpreter itself emits.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct EventConfig {
    channel: String,
    operation: String,
}

pub struct EventNode;

#[async_trait]
impl ExecutableNode for EventNode {
    async fn execute(&self, input: Value, config: &Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: EventConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid event config: {e}")))?;

        match config.operation.as_str() {
            "publish" => {
                ctx.events
                    .publish(&config.channel, Some(ctx.workflow_id), Some(ctx.execution_id), None, input.clone())
                    .await
                    .map_err(|e| NodeError::Retryable(format!("failed to publish event: {e}")))?;

                Ok(serde_json::json!({ "channel": config.channel, "payload": input }))
            }
            "subscribe" => Err(NodeError::Fatal("event subscribe is not implemented".to_string())),
            other => Err(NodeError::Fatal(format!("unknown event operation '{other}'"))),
        }
    }
}
