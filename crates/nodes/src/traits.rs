//! The `ExecutableNode` trait — the contract every node activity must fulfil.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::NodeError;

/// Capabilities and per-run state handed to every node activity.
///
/// Named `ActivityContext` (rather than `ExecutionContext`) because the
/// interpreter's own `engine::context::ExecutionContext` is a different,
/// larger thing — the full node-output/history state of a run. This is only
/// what an individual activity needs to do its work.
#[derive(Clone)]
pub struct ActivityContext {
    pub workflow_id: uuid::Uuid,
    pub execution_id: uuid::Uuid,
    /// The original input the workflow execution was started with.
    pub workflow_input: Value,
    /// Decrypted secrets scoped to this workflow.
    pub secrets: std::collections::HashMap<String, String>,
    /// Shared HTTP client for `api_call`/`agent` activities.
    pub http_client: reqwest::Client,
    /// Durable persistence pool — used by `approval` to create/read slots.
    pub db: db::DbPool,
    /// Event fabric — used by `approval`/`event` to publish.
    pub events: Arc<events::EventBus>,
}

/// The core node-activity trait.
///
/// `input` is the mapped output of the upstream node (computed by
/// `mapper::extract` before dispatch); `config` is this node's own
/// type-specific configuration. Implementations must not panic — a missing
/// or malformed config field is a `NodeError::Fatal`, not a panic.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the activity, returning raw JSON later normalized by `mapper::normalize`.
    async fn execute(
        &self,
        input: Value,
        config: &Value,
        ctx: &ActivityContext,
    ) -> Result<Value, NodeError>;
}
