//! The interpreter — the workflow state machine (§4.1).
//!
//! `step()` advances an execution by exactly one node and returns an
//! [`Outcome`] describing why it stopped; `drive()` calls `step()`
//! repeatedly until a non-`Continuing` outcome, which is what `start()` and
//! `resume()` do for callers (the `queue` crate's worker loop).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mapper::{NodeOutput, OutputPayload, OutputStatus};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use db::DbPool;
use nodes::{ActivityContext, NodeError, NodeRegistry};

use crate::{
    compensation::CompensationCoordinator,
    context::{ApprovalResponse, ApprovalSlot, ApprovalStatus, ExecutionContext, HistoryStatus},
    error::EngineError,
    expr::{self, EvalRoots},
    models::{Edge, Node, NodeType, WorkflowDefinition},
};

/// Why a `step`/`drive` call stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Paused,
    WaitingApproval,
    Sleeping,
    Continuing,
    Completed(Value),
    Failed(String),
    Canceled,
}

struct RetryPolicy {
    max_attempts: u32,
    base_backoff_ms: u64,
    timeout: Duration,
}

fn retry_policy_for(node_type: NodeType) -> RetryPolicy {
    match node_type {
        NodeType::Agent => RetryPolicy { max_attempts: 3, base_backoff_ms: 1_000, timeout: Duration::from_secs(600) },
        NodeType::ApiCall => RetryPolicy { max_attempts: 3, base_backoff_ms: 1_000, timeout: Duration::from_secs(120) },
        NodeType::Eval => RetryPolicy { max_attempts: 3, base_backoff_ms: 500, timeout: Duration::from_secs(120) },
        NodeType::Approval => RetryPolicy { max_attempts: 1, base_backoff_ms: 0, timeout: Duration::from_secs(60) },
        NodeType::Merge => RetryPolicy { max_attempts: 1, base_backoff_ms: 0, timeout: Duration::from_secs(60) },
        NodeType::Event => RetryPolicy { max_attempts: 2, base_backoff_ms: 500, timeout: Duration::from_secs(30) },
        NodeType::Timer | NodeType::Trigger | NodeType::Conditional | NodeType::End => {
            RetryPolicy { max_attempts: 1, base_backoff_ms: 0, timeout: Duration::from_secs(30) }
        }
    }
}

pub struct Interpreter {
    pool: DbPool,
    registry: Arc<NodeRegistry>,
    events: Arc<events::EventBus>,
    compensation: CompensationCoordinator,
    http_client: reqwest::Client,
}

impl Interpreter {
    pub fn new(pool: DbPool, registry: Arc<NodeRegistry>, events: Arc<events::EventBus>) -> Self {
        let http_client = reqwest::Client::new();
        Self {
            pool,
            registry,
            events,
            compensation: CompensationCoordinator::new(http_client.clone()),
            http_client,
        }
    }

    // -----------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------

    /// Start a new execution of `def` with `input`, driving it to its first
    /// suspension point. Creates the `workflow_executions` row itself.
    pub async fn start(&self, def: &WorkflowDefinition, input: Value) -> Result<(Uuid, Outcome), EngineError> {
        let row = db::repository::executions::create_execution(&self.pool, def.id, input.clone()).await?;
        let outcome = self.start_queued(def, row.id, input).await?;
        Ok((row.id, outcome))
    }

    /// Drive a fresh `ExecutionContext` against an execution row that already
    /// exists (the `queue` crate's worker enqueues a job against a row it —
    /// or the API layer — created up front, since `job_queue.execution_id`
    /// is a NOT NULL foreign key).
    pub async fn start_queued(&self, def: &WorkflowDefinition, execution_id: Uuid, input: Value) -> Result<Outcome, EngineError> {
        let mut ctx = ExecutionContext::new(def.id, execution_id, input);

        let _ = self
            .events
            .publish(
                "workflow.started",
                Some(def.id),
                Some(execution_id),
                None,
                json!({"workflow_id": def.id, "execution_id": execution_id}),
            )
            .await;

        self.drive(def, execution_id, &mut ctx).await
    }

    /// Reconstruct an execution's context from its last checkpoint and
    /// continue driving it.
    pub async fn resume(&self, def: &WorkflowDefinition, execution_id: Uuid) -> Result<Outcome, EngineError> {
        let row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
        let mut ctx: ExecutionContext = serde_json::from_value(row.context_snapshot.clone())
            .map_err(|e| EngineError::Validation(format!("corrupt context snapshot: {e}")))?;
        ctx.paused = false;
        self.drive(def, execution_id, &mut ctx).await
    }

    /// Flip the pause flag; takes effect at the next suspension point.
    pub async fn pause(&self, execution_id: Uuid) -> Result<(), EngineError> {
        db::repository::executions::set_paused(&self.pool, execution_id, true).await?;
        Ok(())
    }

    /// Clear the pause flag and resume stepping.
    pub async fn unpause(&self, def: &WorkflowDefinition, execution_id: Uuid) -> Result<Outcome, EngineError> {
        let row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
        let mut ctx: ExecutionContext = serde_json::from_value(row.context_snapshot.clone())
            .map_err(|e| EngineError::Validation(format!("corrupt context snapshot: {e}")))?;
        ctx.paused = false;
        db::repository::executions::set_paused(&self.pool, execution_id, false).await?;
        self.drive(def, execution_id, &mut ctx).await
    }

    /// Terminate the run with status `canceled`. No compensation by default.
    pub async fn cancel(&self, execution_id: Uuid, reason: Option<&str>, compensate: bool) -> Result<(), EngineError> {
        let row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
        if compensate {
            if let Ok(ctx) = serde_json::from_value::<ExecutionContext>(row.context_snapshot.clone()) {
                if let Ok(workflow) = db::repository::workflows::get_workflow(&self.pool, row.workflow_id).await {
                    if let Ok(def) = serde_json::from_value::<WorkflowDefinition>(workflow.definition) {
                        self.compensation
                            .compensate(&self.pool, &self.events, row.workflow_id, execution_id, &def.nodes, &ctx)
                            .await;
                    }
                }
            }
        }

        db::repository::executions::finalize_execution(
            &self.pool,
            execution_id,
            "canceled",
            None,
            reason,
            reason,
        )
        .await?;

        let _ = self
            .events
            .publish(
                "workflow.canceled",
                Some(row.workflow_id),
                Some(execution_id),
                None,
                json!({"reason": reason}),
            )
            .await;

        Ok(())
    }

    /// Deliver an `approval_signal`: append the response, resolve the slot
    /// if the approval_type's condition is met, and resume driving.
    pub async fn approval_signal(
        &self,
        def: &WorkflowDefinition,
        execution_id: Uuid,
        action: &str,
        approver: Option<String>,
        comment: Option<String>,
    ) -> Result<Outcome, EngineError> {
        let row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
        let mut ctx: ExecutionContext = serde_json::from_value(row.context_snapshot.clone())
            .map_err(|e| EngineError::Validation(format!("corrupt context snapshot: {e}")))?;

        let Some(slot) = ctx.pending_approval.clone() else {
            return Err(EngineError::Validation("no pending approval for this execution".to_string()));
        };

        if approval_deadline_passed(&slot) {
            let node = def
                .node(&slot.node_id)
                .ok_or_else(|| EngineError::UnknownNode(slot.node_id.clone()))?
                .clone();
            let reason = EngineError::ApprovalTimeout {
                node_id: slot.node_id.clone(),
                timeout_hours: slot.timeout_hours.unwrap_or(0.0),
            }
            .to_string();
            ctx.pending_approval = None;
            return self.handle_terminal_failure(def, execution_id, &node, reason, &mut ctx, true).await;
        }

        let response = json!({
            "approver": approver,
            "action": action,
            "comment": comment,
            "timestamp": chrono::Utc::now(),
        });
        db::repository::approvals::append_response(&self.pool, slot.approval_id, response).await?;
        let updated = db::repository::approvals::get_approval(&self.pool, slot.approval_id).await?;

        let responses: Vec<ApprovalResponse> = serde_json::from_value(updated.responses.clone())
            .unwrap_or_default();

        let resolution = resolve_multi_approver(&slot.approval_type, slot.total_approvers, &responses);

        if let Some(resolved_action) = resolution {
            db::repository::approvals::resolve_approval(&self.pool, slot.approval_id, resolved_action).await?;

            let _ = self
                .events
                .publish(
                    if resolved_action == "approved" { "approval.granted" } else { "approval.denied" },
                    Some(def.id),
                    Some(execution_id),
                    Some(&slot.node_id),
                    json!({"approval_id": slot.approval_id, "action": resolved_action}),
                )
                .await;

            let mapped = NodeOutput::new(
                &slot.node_id,
                mapper::NodeKind::Approval,
                OutputStatus::Success,
                json!({"action": resolved_action, "approved": resolved_action == "approved", "responses": responses}),
                OutputPayload::ApprovalOut {
                    approved: resolved_action == "approved",
                    approver: responses.last().and_then(|r| r.approver.clone()),
                    comments: responses.iter().filter_map(|r| r.comment.clone()).collect(),
                },
            );
            ctx.mapped_outputs.insert(slot.node_id.clone(), mapped.clone());
            ctx.node_outputs.insert(slot.node_id.clone(), mapped);
            ctx.pending_approval = None;
        }

        self.drive(def, execution_id, &mut ctx).await
    }

    // -----------------------------------------------------------------
    // Core loop
    // -----------------------------------------------------------------

    async fn drive(&self, def: &WorkflowDefinition, execution_id: Uuid, ctx: &mut ExecutionContext) -> Result<Outcome, EngineError> {
        loop {
            let row = db::repository::executions::get_execution(&self.pool, execution_id).await?;
            match self.step(def, &row, ctx).await? {
                Outcome::Continuing => continue,
                other => return Ok(other),
            }
        }
    }

    /// Advance by exactly one node.
    async fn step(
        &self,
        def: &WorkflowDefinition,
        row: &db::models::WorkflowExecutionRow,
        ctx: &mut ExecutionContext,
    ) -> Result<Outcome, EngineError> {
        if ctx.paused {
            self.checkpoint(def.id, row.id, None, true, ctx).await?;
            return Ok(Outcome::Paused);
        }

        let node_id = match &row.current_node {
            Some(id) => id.clone(),
            None => def
                .nodes
                .iter()
                .find(|n| n.node_type == NodeType::Trigger)
                .map(|n| n.id.clone())
                .ok_or_else(|| EngineError::Validation("workflow has no trigger node".to_string()))?,
        };

        let node = def
            .node(&node_id)
            .ok_or_else(|| EngineError::UnknownNode(node_id.clone()))?
            .clone();

        if node.node_type == NodeType::End {
            return self.finalize(def, row.id, &node, ctx).await;
        }

        // Approval node whose dispatch already happened and is now resolved.
        if node.node_type == NodeType::Approval && ctx.pending_approval.is_none() {
            if let Some(mapped) = ctx.mapped_outputs.get(&node_id).cloned() {
                return self.branch(def, row.id, &node, &mapped, ctx).await;
            }
        }
        if let Some(slot) = ctx.pending_approval.clone() {
            if slot.node_id == node_id {
                if approval_deadline_passed(&slot) {
                    let reason = EngineError::ApprovalTimeout {
                        node_id: node_id.clone(),
                        timeout_hours: slot.timeout_hours.unwrap_or(0.0),
                    }
                    .to_string();
                    ctx.pending_approval = None;
                    return self.handle_terminal_failure(def, row.id, &node, reason, ctx, true).await;
                }
                return Ok(Outcome::WaitingApproval);
            }
        }

        ctx.begin_node(&node_id, false);

        let upstream = ctx.previous_output_for(&node_id).cloned();
        let mut dispatch_input = match &upstream {
            Some(out) => mapper::extract(out, node.node_type.to_mapper_kind(), &node.config),
            None => ctx.workflow_input.clone(),
        };
        if node.node_type == NodeType::Approval {
            inject_node_id(&mut dispatch_input, &node_id);
        }
        if node.node_type == NodeType::Merge {
            let branches: Map<String, Value> = def
                .incoming_edges(&node_id)
                .iter()
                .filter_map(|e| ctx.mapped_outputs.get(&e.source).map(|out| (e.source.clone(), out.header.raw.clone())))
                .collect();
            if let Some(obj) = dispatch_input.as_object_mut() {
                obj.insert("branches".to_string(), Value::Object(branches));
            } else {
                dispatch_input = json!({"branches": branches});
            }
        }

        let secrets = db::repository::secrets::list_secrets(&self.pool, def.id)
            .await
            .unwrap_or_default();
        let activity_ctx = ActivityContext {
            workflow_id: def.id,
            execution_id: row.id,
            workflow_input: ctx.workflow_input.clone(),
            secrets,
            http_client: self.http_client.clone(),
            db: self.pool.clone(),
            events: self.events.clone(),
        };

        let _ = self
            .events
            .publish(
                "node.started",
                Some(def.id),
                Some(row.id),
                Some(&node_id),
                json!({"node_id": node_id, "node_type": node.node_type.as_str()}),
            )
            .await;

        match self
            .dispatch_with_policy(&node, dispatch_input, &activity_ctx)
            .await
        {
            Ok(raw) => self.on_node_success(def, row.id, &node, raw, ctx).await,
            Err(err) => self.on_node_failure(def, row.id, &node, err, ctx).await,
        }
    }

    async fn on_node_success(
        &self,
        def: &WorkflowDefinition,
        execution_id: Uuid,
        node: &Node,
        raw: Value,
        ctx: &mut ExecutionContext,
    ) -> Result<Outcome, EngineError> {
        let mapped = mapper::normalize(&node.id, node.node_type.to_mapper_kind(), OutputStatus::Success, raw.clone());
        ctx.finish_node(&node.id, true, Some(mapped.clone()));

        let _ = self
            .events
            .publish(
                "node.completed",
                Some(def.id),
                Some(execution_id),
                Some(&node.id),
                json!({"node_id": node.id, "output": raw}),
            )
            .await;

        if node.node_type == NodeType::Agent {
            if let OutputPayload::AgentOut { cost, .. } = &mapped.payload {
                let _ = crate::selfhealing::record_agent_execution(
                    &self.pool,
                    &raw.get("provider").and_then(Value::as_str).unwrap_or("openai").to_string(),
                    &raw.get("agent_id").and_then(Value::as_str).unwrap_or("default").to_string(),
                    true,
                    0.0,
                    *cost,
                )
                .await;
            }
        }

        if node.node_type == NodeType::Approval {
            if let Some(approval_id) = raw.get("approval_id").and_then(Value::as_str).and_then(|s| s.parse::<Uuid>().ok()) {
                if let Ok(approval_row) = db::repository::approvals::get_approval(&self.pool, approval_id).await {
                    ctx.pending_approval = Some(ApprovalSlot {
                        approval_id,
                        execution_id,
                        node_id: node.id.clone(),
                        status: ApprovalStatus::Pending,
                        approval_type: approval_row.approval_type,
                        total_approvers: approval_row.total_approvers,
                        responses: serde_json::from_value(approval_row.responses).unwrap_or_default(),
                        requested_at: approval_row.requested_at,
                        resolved_at: approval_row.resolved_at,
                        timeout_hours: raw.get("timeout_hours").and_then(Value::as_f64),
                    });
                }
            }
            self.checkpoint(def.id, execution_id, Some(&node.id), false, ctx).await?;
            return Ok(Outcome::WaitingApproval);
        }

        if node.node_type == NodeType::Timer {
            let seconds = raw
                .get("duration_seconds")
                .and_then(Value::as_u64)
                .unwrap_or(0)
                .min(24 * 3600);
            self.checkpoint(def.id, execution_id, Some(&node.id), false, ctx).await?;
            let _ = self
                .events
                .publish("timer.started", Some(def.id), Some(execution_id), Some(&node.id), json!({"duration_seconds": seconds}))
                .await;
            if seconds > 0 {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
            }
            let _ = self
                .events
                .publish("timer.completed", Some(def.id), Some(execution_id), Some(&node.id), json!({}))
                .await;
        }

        if node.node_type == NodeType::Eval {
            if let OutputPayload::EvalOut { passed, feedback, on_failure, .. } = &mapped.payload {
                if !*passed {
                    let _ = self
                        .events
                        .publish("eval.completed", Some(def.id), Some(execution_id), Some(&node.id), json!({"passed": false}))
                        .await;
                    match on_failure.as_str() {
                        "warn" => {
                            // Treated as success with a partial status; fall through to branching.
                        }
                        "retry" => {
                            let attempts = db::repository::executions::increment_retry_count(&self.pool, execution_id).await?;
                            let policy = retry_policy_for(node.node_type);
                            if attempts < policy.max_attempts as i32 {
                                self.checkpoint(def.id, execution_id, Some(&node.id), false, ctx).await?;
                                return Ok(Outcome::Continuing);
                            }
                            return self.handle_terminal_failure(def, execution_id, node, feedback.clone(), ctx, false).await;
                        }
                        "compensate" => {
                            return self.handle_terminal_failure(def, execution_id, node, feedback.clone(), ctx, true).await;
                        }
                        _ => {
                            return self.handle_terminal_failure(def, execution_id, node, feedback.clone(), ctx, false).await;
                        }
                    }
                }
            }
        }

        self.branch(def, execution_id, node, &mapped, ctx).await
    }

    async fn on_node_failure(
        &self,
        def: &WorkflowDefinition,
        execution_id: Uuid,
        node: &Node,
        err: NodeError,
        ctx: &mut ExecutionContext,
    ) -> Result<Outcome, EngineError> {
        ctx.finish_node(&node.id, false, None);
        let message = err.to_string();

        let _ = self
            .events
            .publish(
                "node.failed",
                Some(def.id),
                Some(execution_id),
                Some(&node.id),
                json!({"node_id": node.id, "error": message}),
            )
            .await;

        if node.node_type == NodeType::Agent {
            let provider = node.config.get("provider").and_then(Value::as_str).unwrap_or("openai").to_string();
            let failed_agent = node.config.get("agent_id").and_then(Value::as_str).unwrap_or("default").to_string();
            let _ = crate::selfhealing::record_agent_execution(&self.pool, &provider, &failed_agent, false, 0.0, 0.0).await;

            let candidates: Vec<String> = node
                .config
                .get("fallback_agent_ids")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                .unwrap_or_default();

            let reroute_allowed = crate::selfhealing::should_reroute(&self.pool, &provider, &failed_agent)
                .await
                .unwrap_or(false);

            if reroute_allowed && !candidates.is_empty() {
                if let Ok(Some(alternate)) = crate::selfhealing::get_alternate_agent(&self.pool, &provider, &failed_agent, &candidates).await {
                    warn!(node_id = %node.id, alternate, "rerouting to alternate agent after failure");
                    let mut fallback_config = node.config.clone();
                    if let Some(obj) = fallback_config.as_object_mut() {
                        obj.insert("agent_id".to_string(), Value::String(alternate));
                    }
                    let secrets = db::repository::secrets::list_secrets(&self.pool, def.id).await.unwrap_or_default();
                    let activity_ctx = ActivityContext {
                        workflow_id: def.id,
                        execution_id,
                        workflow_input: ctx.workflow_input.clone(),
                        secrets,
                        http_client: self.http_client.clone(),
                        db: self.pool.clone(),
                        events: self.events.clone(),
                    };
                    let upstream = ctx.previous_output_for(&node.id).cloned();
                    let dispatch_input = match &upstream {
                        Some(out) => mapper::extract(out, node.node_type.to_mapper_kind(), &fallback_config),
                        None => ctx.workflow_input.clone(),
                    };
                    ctx.begin_node(&node.id, true);
                    if let Ok(raw) = self.registry.dispatch("agent", dispatch_input, &fallback_config, &activity_ctx).await {
                        return self.on_node_success(def, execution_id, node, raw, ctx).await;
                    }
                    ctx.finish_node(&node.id, false, None);
                }
            }
        }

        self.handle_terminal_failure(def, execution_id, node, message, ctx, true).await
    }

    async fn handle_terminal_failure(
        &self,
        def: &WorkflowDefinition,
        execution_id: Uuid,
        node: &Node,
        reason: String,
        ctx: &mut ExecutionContext,
        compensate: bool,
    ) -> Result<Outcome, EngineError> {
        if compensate {
            self.compensation
                .compensate(&self.pool, &self.events, def.id, execution_id, &def.nodes, ctx)
                .await;
        }

        db::repository::executions::finalize_execution(
            &self.pool,
            execution_id,
            "failed",
            None,
            Some(&reason),
            Some(&reason),
        )
        .await?;

        let _ = self
            .events
            .publish(
                "workflow.failed",
                Some(def.id),
                Some(execution_id),
                Some(&node.id),
                json!({"node_id": node.id, "reason": reason}),
            )
            .await;

        self.checkpoint(def.id, execution_id, Some(&node.id), false, ctx).await?;
        Ok(Outcome::Failed(reason))
    }

    /// Decide and move to the next node given branching rules (§4.1).
    async fn branch(
        &self,
        def: &WorkflowDefinition,
        execution_id: Uuid,
        node: &Node,
        mapped: &NodeOutput,
        ctx: &mut ExecutionContext,
    ) -> Result<Outcome, EngineError> {
        let edges = def.outgoing_edges(&node.id);
        let next_id = match node.node_type {
            NodeType::Conditional => {
                let matched = self.evaluate_condition(node, mapped, ctx)?;
                let handle = if matched { "true" } else { "false" };
                edges
                    .iter()
                    .find(|e| e.source_handle.as_deref() == Some(handle))
                    .or_else(|| edges.iter().find(|e| e.source_handle.is_none()))
                    .map(|e| e.target.clone())
            }
            NodeType::Approval => {
                let approved = match &mapped.payload {
                    OutputPayload::ApprovalOut { approved, .. } => *approved,
                    _ => false,
                };
                let handle = if approved { "approve" } else { "reject" };
                edges.iter().find(|e| e.source_handle.as_deref() == Some(handle)).map(|e| e.target.clone())
            }
            _ => {
                let unconditional = first_unconditional_edge(&edges);
                if edges.len() > 1 && unconditional.is_some() {
                    let _ = self
                        .events
                        .publish(
                            "meta.observation",
                            Some(def.id),
                            Some(execution_id),
                            Some(&node.id),
                            json!({"observation": "multiple unconditional outgoing edges, following the first by id"}),
                        )
                        .await;
                }
                unconditional.map(|e| e.target.clone())
            }
        };

        match next_id {
            Some(id) => {
                self.checkpoint(def.id, execution_id, Some(&id), false, ctx).await?;
                Ok(Outcome::Continuing)
            }
            None => self.finalize_without_end(def, execution_id, ctx).await,
        }
    }

    fn evaluate_condition(&self, node: &Node, mapped: &NodeOutput, ctx: &ExecutionContext) -> Result<bool, EngineError> {
        if let Some(expr_src) = node.config.get("condition_expression").and_then(Value::as_str) {
            let output_value = ctx
                .previous_output_for(&node.id)
                .map(|out| out.header.raw.clone())
                .unwrap_or_else(|| mapped.header.raw.clone());
            let nodes_value = json!(ctx
                .node_outputs
                .iter()
                .map(|(id, out)| (id.clone(), out.header.raw.clone()))
                .collect::<HashMap<_, _>>());
            let roots = EvalRoots { output: &output_value, nodes: &nodes_value, input: &ctx.workflow_input };
            return expr::evaluate(expr_src, &roots).map_err(|source| EngineError::ConditionError { node_id: node.id.clone(), source });
        }
        Ok(match &mapped.payload {
            OutputPayload::ConditionOut { matched, .. } => *matched,
            _ => false,
        })
    }

    /// Node ran out of outgoing edges without hitting an `end` node.
    async fn finalize_without_end(&self, def: &WorkflowDefinition, execution_id: Uuid, ctx: &mut ExecutionContext) -> Result<Outcome, EngineError> {
        let output = ctx
            .history
            .iter()
            .rev()
            .find(|e| matches!(e.status, HistoryStatus::Success))
            .and_then(|e| ctx.mapped_outputs.get(&e.node_id))
            .map(|o| o.header.raw.clone())
            .unwrap_or(Value::Null);

        db::repository::executions::finalize_execution(&self.pool, execution_id, "completed", Some(output.clone()), None, None).await?;
        let _ = self
            .events
            .publish("workflow.completed", Some(def.id), Some(execution_id), None, json!({"output": output}))
            .await;
        self.checkpoint(def.id, execution_id, None, false, ctx).await?;
        Ok(Outcome::Completed(output))
    }

    async fn finalize(&self, def: &WorkflowDefinition, execution_id: Uuid, end_node: &Node, ctx: &mut ExecutionContext) -> Result<Outcome, EngineError> {
        let capture_output = end_node.config.get("capture_output").and_then(Value::as_bool).unwrap_or(false);

        let output = if capture_output {
            ctx.history
                .iter()
                .rev()
                .filter(|e| matches!(e.status, HistoryStatus::Success) && e.node_id != end_node.id)
                .next()
                .and_then(|e| ctx.mapped_outputs.get(&e.node_id))
                .map(|o| o.header.raw.clone())
                .unwrap_or(Value::Null)
        } else {
            ctx.history
                .iter()
                .rev()
                .find(|e| matches!(e.status, HistoryStatus::Success))
                .and_then(|e| ctx.mapped_outputs.get(&e.node_id))
                .map(|o| o.header.raw.clone())
                .unwrap_or(Value::Null)
        };

        db::repository::executions::finalize_execution(&self.pool, execution_id, "completed", Some(output.clone()), None, None).await?;
        info!(execution_id = %execution_id, "workflow execution completed");
        let _ = self
            .events
            .publish("workflow.completed", Some(def.id), Some(execution_id), None, json!({"output": output}))
            .await;
        self.checkpoint(def.id, execution_id, Some(&end_node.id), false, ctx).await?;
        Ok(Outcome::Completed(output))
    }

    async fn checkpoint(
        &self,
        _workflow_id: Uuid,
        execution_id: Uuid,
        current_node: Option<&str>,
        paused: bool,
        ctx: &mut ExecutionContext,
    ) -> Result<(), EngineError> {
        ctx.paused = paused;
        let snapshot = serde_json::to_value(&*ctx).map_err(|e| EngineError::Validation(format!("failed to serialize context: {e}")))?;
        db::repository::executions::save_checkpoint(&self.pool, execution_id, current_node, paused, snapshot).await?;
        Ok(())
    }

    /// Run an activity under its type's timeout and retry policy.
    async fn dispatch_with_policy(&self, node: &Node, input: Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let policy = retry_policy_for(node.node_type);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let fut = self.registry.dispatch(node.node_type.as_str(), input.clone(), &node.config, ctx);
            let result = tokio::time::timeout(policy.timeout, fut).await;

            let outcome = match result {
                Ok(inner) => inner,
                Err(_) => Err(NodeError::Retryable(format!("node '{}' timed out after {:?}", node.id, policy.timeout))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(NodeError::Fatal(msg)) => return Err(NodeError::Fatal(msg)),
                Err(NodeError::Retryable(msg)) => {
                    if attempt >= policy.max_attempts {
                        return Err(NodeError::Retryable(format!("{msg} (exhausted {} attempts)", policy.max_attempts)));
                    }
                    let backoff_ms = (policy.base_backoff_ms * 2u64.pow(attempt - 1)).clamp(policy.base_backoff_ms.max(1), 10_000);
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApprovalResponse;

    // These exercise the interpreter's pure decision logic — branch edge
    // selection, retry policy, multi-approver resolution — without touching
    // Postgres. `step`/`drive`/`start` themselves need a live `DbPool` (every
    // suspension point is a checkpoint write) and are covered by the
    // DB-backed scenarios in the project's integration suite, not here.

    fn edge(id: &str, source: &str, target: &str, handle: Option<&str>) -> Edge {
        Edge { id: id.to_string(), source: source.to_string(), target: target.to_string(), source_handle: handle.map(String::from), condition: None }
    }

    fn response(approver: &str, action: &str) -> ApprovalResponse {
        ApprovalResponse {
            approver: Some(approver.to_string()),
            action: action.to_string(),
            comment: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn first_unconditional_edge_picks_lowest_id() {
        let e1 = edge("e2", "a", "c", None);
        let e2 = edge("e1", "a", "b", None);
        let labeled = edge("e0", "a", "x", Some("true"));
        let edges = vec![&labeled, &e1, &e2];
        let picked = first_unconditional_edge(&edges).expect("an unconditional edge exists");
        assert_eq!(picked.id, "e1");
    }

    #[test]
    fn first_unconditional_edge_none_when_all_labeled() {
        let labeled = edge("e0", "a", "x", Some("true"));
        let edges = vec![&labeled];
        assert!(first_unconditional_edge(&edges).is_none());
    }

    #[test]
    fn inject_node_id_adds_field_to_object() {
        let mut value = json!({"foo": "bar"});
        inject_node_id(&mut value, "node-1");
        assert_eq!(value["_node_id"], "node-1");
        assert_eq!(value["foo"], "bar");
    }

    #[test]
    fn inject_node_id_wraps_non_object_input() {
        let mut value = json!("plain string");
        inject_node_id(&mut value, "node-1");
        assert_eq!(value["_node_id"], "node-1");
        assert_eq!(value["input"], "plain string");
    }

    #[test]
    fn resolve_multi_approver_any_resolves_on_first_approval() {
        let responses = vec![response("alice", "approve")];
        assert_eq!(resolve_multi_approver("any", 3, &responses), Some("approved"));
    }

    #[test]
    fn resolve_multi_approver_any_resolves_on_first_rejection() {
        let responses = vec![response("alice", "reject")];
        assert_eq!(resolve_multi_approver("any", 3, &responses), Some("rejected"));
    }

    #[test]
    fn resolve_multi_approver_all_waits_for_every_approver() {
        let responses = vec![response("alice", "approve")];
        assert_eq!(resolve_multi_approver("all", 2, &responses), None);
        let responses = vec![response("alice", "approve"), response("bob", "approve")];
        assert_eq!(resolve_multi_approver("all", 2, &responses), Some("approved"));
    }

    #[test]
    fn resolve_multi_approver_all_rejects_on_single_rejection() {
        let responses = vec![response("alice", "approve"), response("bob", "reject")];
        assert_eq!(resolve_multi_approver("all", 3, &responses), Some("rejected"));
    }

    #[test]
    fn resolve_multi_approver_majority_waits_for_quorum() {
        let responses = vec![response("alice", "approve")];
        assert_eq!(resolve_multi_approver("majority", 3, &responses), None);
        let responses = vec![response("alice", "approve"), response("bob", "reject"), response("carol", "approve")];
        assert_eq!(resolve_multi_approver("majority", 3, &responses), Some("approved"));
    }

    #[test]
    fn retry_policy_matches_agent_node_budget() {
        let policy = retry_policy_for(NodeType::Agent);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_secs(600));
    }

    #[test]
    fn retry_policy_single_attempt_for_approval() {
        let policy = retry_policy_for(NodeType::Approval);
        assert_eq!(policy.max_attempts, 1);
    }

    fn slot_requested_hours_ago(hours_ago: i64, timeout_hours: Option<f64>) -> ApprovalSlot {
        ApprovalSlot {
            approval_id: Uuid::new_v4(),
            execution_id: Uuid::new_v4(),
            node_id: "approval-1".to_string(),
            status: ApprovalStatus::Pending,
            approval_type: "any".to_string(),
            total_approvers: 1,
            responses: vec![],
            requested_at: Utc::now() - chrono::Duration::hours(hours_ago),
            resolved_at: None,
            timeout_hours,
        }
    }

    #[test]
    fn approval_deadline_not_passed_without_timeout_configured() {
        let slot = slot_requested_hours_ago(1000, None);
        assert!(!approval_deadline_passed(&slot));
    }

    #[test]
    fn approval_deadline_not_passed_before_timeout() {
        let slot = slot_requested_hours_ago(1, Some(4.0));
        assert!(!approval_deadline_passed(&slot));
    }

    #[test]
    fn approval_deadline_passed_after_timeout() {
        let slot = slot_requested_hours_ago(5, Some(4.0));
        assert!(approval_deadline_passed(&slot));
    }
}

/// §5 / §9: a pending approval with `timeout_hours` set expires once that
/// many hours have elapsed since `requested_at`, checked uniformly here
/// rather than at individual call sites.
fn approval_deadline_passed(slot: &ApprovalSlot) -> bool {
    match slot.timeout_hours {
        Some(hours) if hours > 0.0 => {
            let deadline = slot.requested_at + chrono::Duration::milliseconds((hours * 3_600_000.0) as i64);
            Utc::now() > deadline
        }
        _ => false,
    }
}

fn first_unconditional_edge<'a>(edges: &'a [&'a Edge]) -> Option<&'a Edge> {
    let mut candidates: Vec<&Edge> = edges.iter().copied().filter(|e| e.source_handle.is_none()).collect();
    candidates.sort_by(|a, b| a.id.cmp(&b.id));
    candidates.into_iter().next()
}

fn inject_node_id(value: &mut Value, node_id: &str) {
    match value.as_object_mut() {
        Some(obj) => {
            obj.insert("_node_id".to_string(), Value::String(node_id.to_string()));
        }
        None => {
            *value = json!({"_node_id": node_id, "input": value.clone()});
        }
    }
}

/// Apply the `approval_type` resolution table against accumulated responses.
/// Returns `Some("approved"|"rejected")` once a decision is reached, else `None`.
fn resolve_multi_approver(approval_type: &str, total_approvers: i32, responses: &[ApprovalResponse]) -> Option<&'static str> {
    let approvals = responses.iter().filter(|r| r.action == "approve").count();
    let rejections = responses.iter().filter(|r| r.action == "reject").count();

    match approval_type {
        "all" => {
            if rejections > 0 {
                Some("rejected")
            } else if approvals as i32 >= total_approvers {
                Some("approved")
            } else {
                None
            }
        }
        "majority" => {
            if responses.len() as i32 >= total_approvers {
                if approvals > rejections {
                    Some("approved")
                } else {
                    Some("rejected")
                }
            } else {
                None
            }
        }
        _ => {
            if approvals > 0 {
                Some("approved")
            } else if rejections > 0 {
                Some("rejected")
            } else {
                None
            }
        }
    }
}
