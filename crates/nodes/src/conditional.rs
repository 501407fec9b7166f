//! `conditional` node activity — a no-op executor; branching is decided by
//! the interpreter after evaluating `condition_expression` via `engine::expr`.

use async_trait::async_trait;
use serde_json::Value;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

pub struct ConditionalNode;

#[async_trait]
impl ExecutableNode for ConditionalNode {
    async fn execute(&self, input: Value, _config: &Value, _ctx: &ActivityContext) -> Result<Value, NodeError> {
        // The interpreter evaluates the condition and passes its result in
        // `input.matched`; this executor just echoes a normalized shape.
        let matched = input.get("matched").and_then(Value::as_bool).unwrap_or(false);
        Ok(serde_json::json!({
            "matched": matched,
            "branch": if matched { "true" } else { "false" },
            "evaluation": input,
        }))
    }
}
