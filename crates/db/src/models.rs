//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour.
//! Domain types live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow definition row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Full JSON workflow definition (nodes, edges, …)
    pub definition: serde_json::Value,
    pub is_template: bool,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Possible statuses for a workflow execution.
///
/// Kept as a plain string column (rather than a Postgres enum type) so new
/// statuses never require a migration — mirrors `JobStatus` below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Canceled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// A persisted workflow execution row — the durable backing store for the
/// interpreter's `ExecutionContext`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowExecutionRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub current_node: Option<String>,
    pub error: Option<String>,
    pub retry_count: i32,
    pub failure_reason: Option<String>,
    pub compensation_status: Option<String>,
    pub paused: bool,
    /// Full serialized `ExecutionContext` snapshot (node_outputs, mapped_outputs,
    /// history, pending_approval) — this is what makes `resume()` possible after
    /// a process restart without re-deriving state from `node_executions` alone.
    pub context_snapshot: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution (history entry) row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub status: String,
    pub is_fallback: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// approval_requests
// ---------------------------------------------------------------------------

/// A persisted approval slot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRequestRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: String,
    pub approval_type: String,
    pub total_approvers: i32,
    /// Ordered list of `{approver, action, comment, timestamp}`.
    pub responses: serde_json::Value,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// event_logs
// ---------------------------------------------------------------------------

/// A persisted, long-term-audit event record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EventLogRow {
    pub id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
    pub node_id: Option<String>,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// compensation_logs
// ---------------------------------------------------------------------------

/// A persisted compensation attempt.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompensationLogRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub node_id: String,
    pub status: String,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// agent_scores
// ---------------------------------------------------------------------------

/// Per-`(provider, agent_id)` reliability tracking row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentScoreRow {
    pub id: Uuid,
    pub provider: String,
    pub agent_id: String,
    pub execution_count: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub avg_latency_ms: f64,
    pub total_cost: f64,
    pub reliability_score: f64,
    pub last_updated: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// secrets
// ---------------------------------------------------------------------------

/// A persisted secret row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub key: String,
    /// AES-256 encrypted value (base64-encoded ciphertext).
    pub encrypted_value: String,
}

// ---------------------------------------------------------------------------
// job_queue
// ---------------------------------------------------------------------------

/// Possible statuses for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLettered,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::DeadLettered => write!(f, "dead_lettered"),
        }
    }
}

/// A job row fetched from the queue table.
///
/// `payload` carries a small `{"kind": "start"|"resume"|"signal", ...}` envelope
/// that the worker decodes to decide which `Interpreter` entry point to call.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
