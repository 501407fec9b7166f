//! `merge` node activity — combines outputs from multiple incoming branches.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct MergeConfig {
    #[serde(default = "default_strategy")]
    merge_strategy: String,
}

fn default_strategy() -> String {
    "combine".to_string()
}

/// `input.branches` is populated by the interpreter with the mapped outputs
/// of every node that feeds this merge node, keyed by upstream node id.
pub struct MergeNode;

#[async_trait]
impl ExecutableNode for MergeNode {
    async fn execute(&self, input: Value, config: &Value, _ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: MergeConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid merge config: {e}")))?;

        let branches = input
            .get("branches")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let sources: Vec<String> = branches.keys().cloned().collect();
        let values: Vec<&Value> = branches.values().collect();

        let merged = match config.merge_strategy.as_str() {
            "first" => values.first().cloned().cloned().unwrap_or(Value::Null),
            "vote" => {
                let mut tally: HashMap<String, usize> = HashMap::new();
                for v in &values {
                    *tally.entry(v.to_string()).or_insert(0) += 1;
                }
                let winner = tally
                    .iter()
                    .max_by_key(|(_, count)| **count)
                    .map(|(k, _)| k.clone())
                    .unwrap_or_default();
                let winner_value: Value = serde_json::from_str(&winner).unwrap_or(Value::Null);
                json!({ "winner": winner_value, "all_votes": values })
            }
            _ => json!({ "merged_results": values }),
        };

        Ok(json!({
            "merged": merged,
            "sources": sources,
            "strategy": config.merge_strategy,
        }))
    }
}
