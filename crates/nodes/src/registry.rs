//! `NodeRegistry` — maps a node-type tag to its `ExecutableNode` impl.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    agent::AgentNode, api_call::ApiCallNode, approval::ApprovalNode, conditional::ConditionalNode,
    error::NodeError, event::EventNode, eval::EvalNode, merge::MergeNode, timer::TimerNode,
    traits::{ActivityContext, ExecutableNode}, trigger::TriggerNode,
};

/// Holds one `Arc<dyn ExecutableNode>` per registered type name.
///
/// `end` has no entry — the interpreter never dispatches an executor for it.
pub struct NodeRegistry {
    executors: HashMap<String, Arc<dyn ExecutableNode>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self { executors: HashMap::new() }
    }

    pub fn register(&mut self, node_type: impl Into<String>, executor: Arc<dyn ExecutableNode>) {
        self.executors.insert(node_type.into(), executor);
    }

    pub fn get(&self, node_type: &str) -> Result<Arc<dyn ExecutableNode>, NodeError> {
        self.executors
            .get(node_type)
            .cloned()
            .ok_or_else(|| NodeError::Fatal(format!("no executor registered for node type '{node_type}'")))
    }

    pub async fn dispatch(
        &self,
        node_type: &str,
        input: serde_json::Value,
        config: &serde_json::Value,
        ctx: &ActivityContext,
    ) -> Result<serde_json::Value, NodeError> {
        self.get(node_type)?.execute(input, config, ctx).await
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register("trigger", Arc::new(TriggerNode));
        registry.register("agent", Arc::new(AgentNode));
        registry.register("api_call", Arc::new(ApiCallNode));
        registry.register("approval", Arc::new(ApprovalNode));
        registry.register("conditional", Arc::new(ConditionalNode));
        registry.register("eval", Arc::new(EvalNode));
        registry.register("merge", Arc::new(MergeNode));
        registry.register("timer", Arc::new(TimerNode));
        registry.register("event", Arc::new(EventNode));
        registry
    }
}
