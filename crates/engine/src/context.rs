//! `ExecutionContext` — the interpreter's in-memory, durably-reconstructible
//! per-run state.

use chrono::{DateTime, Utc};
use mapper::NodeOutput;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Running,
    Success,
    Failed,
}

/// One entry in the execution's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub node_id: String,
    pub status: HistoryStatus,
    pub is_fallback: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Mediates a human-in-the-loop decision; mirrors `ApprovalRequestRow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSlot {
    pub approval_id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: ApprovalStatus,
    pub approval_type: String,
    pub total_approvers: i32,
    pub responses: Vec<ApprovalResponse>,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub timeout_hours: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approver: Option<String>,
    pub action: String,
    pub comment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The interpreter's full per-run state. Exclusively owned by the
/// interpreter for the run's duration; reconstructed verbatim from
/// `WorkflowExecutionRow::context_snapshot` on resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub workflow_id: Uuid,
    pub execution_id: Uuid,
    pub workflow_input: serde_json::Value,
    pub node_outputs: HashMap<String, NodeOutput>,
    pub mapped_outputs: HashMap<String, NodeOutput>,
    pub history: Vec<HistoryEntry>,
    pub paused: bool,
    pub pending_approval: Option<ApprovalSlot>,
}

impl ExecutionContext {
    pub fn new(workflow_id: Uuid, execution_id: Uuid, workflow_input: serde_json::Value) -> Self {
        Self {
            workflow_id,
            execution_id,
            workflow_input,
            node_outputs: HashMap::new(),
            mapped_outputs: HashMap::new(),
            history: Vec::new(),
            paused: false,
            pending_approval: None,
        }
    }

    /// Record a node as started; appended to the history, never mutated
    /// after — the matching completion updates a fresh lookup by node id.
    pub fn begin_node(&mut self, node_id: &str, is_fallback: bool) {
        self.history.push(HistoryEntry {
            node_id: node_id.to_string(),
            status: HistoryStatus::Running,
            is_fallback,
            start_time: Utc::now(),
            end_time: None,
        });
    }

    /// Mark the most recent `Running` entry for `node_id` as finished, and on
    /// success store `output` into both `node_outputs` and `mapped_outputs`
    /// in lock-step (§3 invariant).
    pub fn finish_node(&mut self, node_id: &str, success: bool, output: Option<NodeOutput>) {
        if let Some(entry) = self
            .history
            .iter_mut()
            .rev()
            .find(|e| e.node_id == node_id && matches!(e.status, HistoryStatus::Running))
        {
            entry.status = if success { HistoryStatus::Success } else { HistoryStatus::Failed };
            entry.end_time = Some(Utc::now());
        }

        if success {
            if let Some(output) = output {
                self.node_outputs.insert(node_id.to_string(), output.clone());
                self.mapped_outputs.insert(node_id.to_string(), output);
            }
        }
    }

    /// The most recent successfully-completed node before `node_id`'s own
    /// history entry — used to compute the next node's "intelligent input".
    pub fn previous_output_for(&self, node_id: &str) -> Option<&NodeOutput> {
        let idx = self.history.iter().rposition(|e| e.node_id == node_id)?;
        self.history[..idx]
            .iter()
            .rev()
            .find(|e| matches!(e.status, HistoryStatus::Success))
            .and_then(|e| self.mapped_outputs.get(&e.node_id))
    }

    /// Invariant check (§8.1): every `node_outputs` key has a matching
    /// `success` history entry, and vice versa.
    pub fn outputs_match_history(&self) -> bool {
        let success_ids: std::collections::HashSet<&str> = self
            .history
            .iter()
            .filter(|e| matches!(e.status, HistoryStatus::Success))
            .map(|e| e.node_id.as_str())
            .collect();
        let output_ids: std::collections::HashSet<&str> =
            self.node_outputs.keys().map(String::as_str).collect();
        success_ids == output_ids
    }
}
