//! `trigger` node activity — returns the workflow input as the mapped output.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct TriggerConfig {
    #[serde(default = "default_trigger_type")]
    r#type: String,
}

fn default_trigger_type() -> String {
    "manual".to_string()
}

pub struct TriggerNode;

#[async_trait]
impl ExecutableNode for TriggerNode {
    async fn execute(&self, _input: Value, config: &Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: TriggerConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid trigger config: {e}")))?;

        Ok(json!({
            "input": ctx.workflow_input,
            "trigger_type": config.r#type,
        }))
    }
}
