//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory. They serialize to/from the JSONB `definition` column of the
//! `workflows` table unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// The closed set of node kinds. `fork`/`loop` from earlier schema
/// generations are deliberately absent — no partial/parallel-fork semantics
/// are implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Trigger,
    Agent,
    ApiCall,
    Approval,
    Conditional,
    Eval,
    Merge,
    Timer,
    Event,
    End,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Agent => "agent",
            Self::ApiCall => "api_call",
            Self::Approval => "approval",
            Self::Conditional => "conditional",
            Self::Eval => "eval",
            Self::Merge => "merge",
            Self::Timer => "timer",
            Self::Event => "event",
            Self::End => "end",
        }
    }

    pub fn to_mapper_kind(self) -> mapper::NodeKind {
        match self {
            Self::Trigger => mapper::NodeKind::Trigger,
            Self::Agent => mapper::NodeKind::Agent,
            Self::ApiCall => mapper::NodeKind::ApiCall,
            Self::Approval => mapper::NodeKind::Approval,
            Self::Conditional => mapper::NodeKind::Conditional,
            Self::Eval => mapper::NodeKind::Eval,
            Self::Merge => mapper::NodeKind::Merge,
            Self::Timer => mapper::NodeKind::Timer,
            Self::Event => mapper::NodeKind::Event,
            Self::End => mapper::NodeKind::End,
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
///
/// `position` is UI-only state (node placement on the canvas) and is
/// excluded from structural-equality comparisons (§8 round-trip property).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub position: Option<serde_json::Value>,
    /// Type-specific config record (§6 of the design doc).
    #[serde(default)]
    pub config: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another.
///
/// `source_handle` disambiguates multi-out nodes (`true|false` on
/// conditional, `approve|reject` on approval).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub source_handle: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// An immutable workflow document: referenced by id, never mutated in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Convenience constructor for tests and the CLI's `execute` subcommand.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            nodes,
            edges,
            is_template: false,
            session_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Outgoing edges from a node, in the order they appear in the document —
    /// this is the deterministic ordering the interpreter's branching rules
    /// rely on ("first outgoing edge, ordered by edge id" is applied by the
    /// caller after this lookup, not here).
    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    /// Incoming edges to a node, in document order — used to gather a
    /// `merge` node's branch sources (§4.2 `incoming_branch_node_ids`).
    pub fn incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Canceled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        };
        write!(f, "{s}")
    }
}

/// In-memory view of a workflow execution, mirroring `WorkflowExecutionRow`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: ExecutionStatus,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub current_node: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub failure_reason: Option<String>,
    pub compensation_status: Option<String>,
}
