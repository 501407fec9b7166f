//! The `NodeOutput` tagged union and its `text_content()` projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The ten closed node kinds a `NodeOutput` can originate from. Kept
/// independent of `engine::NodeType` so this crate stays free of a circular
/// dependency on `engine` (which depends on `mapper`); the two enumerations
/// are kept in lockstep by construction, not by a shared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
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

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
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
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trigger" => Ok(Self::Trigger),
            "agent" => Ok(Self::Agent),
            "api_call" => Ok(Self::ApiCall),
            "approval" => Ok(Self::Approval),
            "conditional" => Ok(Self::Conditional),
            "eval" => Ok(Self::Eval),
            "merge" => Ok(Self::Merge),
            "timer" => Ok(Self::Timer),
            "event" => Ok(Self::Event),
            "end" => Ok(Self::End),
            other => Err(format!("unknown node kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Success,
    Failed,
    Partial,
}

/// Fields common to every `NodeOutput` regardless of node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputHeader {
    pub node_id: String,
    pub node_type: NodeKind,
    pub timestamp: DateTime<Utc>,
    pub status: OutputStatus,
    /// The unmapped activity result, kept for debugging/replay.
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum OutputPayload {
    AgentOut {
        text: String,
        model: String,
        cost: f64,
        temperature: f64,
        usage: serde_json::Value,
    },
    ApiOut {
        status_code: u16,
        body: serde_json::Value,
        headers: serde_json::Value,
        response_time_ms: u64,
        url: String,
    },
    ConditionOut {
        matched: bool,
        branch: String,
        evaluation: serde_json::Value,
    },
    EvalOut {
        passed: bool,
        score: f64,
        feedback: String,
        criteria: serde_json::Value,
        on_failure: String,
    },
    ApprovalOut {
        approved: bool,
        approver: Option<String>,
        comments: Vec<String>,
    },
    TimerOut {
        waited_seconds: u64,
        completed_at: DateTime<Utc>,
    },
    MergeOut {
        merged: serde_json::Value,
        sources: Vec<String>,
        strategy: String,
    },
    EventOut {
        event_name: String,
        payload: serde_json::Value,
    },
    TriggerOut {
        input: serde_json::Value,
        trigger_type: String,
    },
    EndOut {
        captured: Option<serde_json::Value>,
    },
}

/// A node's output reshaped into a tagged-union form consumable by
/// downstream nodes. Referred to as `MappedOutput` once stored in
/// `ExecutionContext::mapped_outputs` — same representation, different point
/// in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutput {
    pub header: OutputHeader,
    pub payload: OutputPayload,
}

impl NodeOutput {
    pub fn new(
        node_id: impl Into<String>,
        node_type: NodeKind,
        status: OutputStatus,
        raw: serde_json::Value,
        payload: OutputPayload,
    ) -> Self {
        Self {
            header: OutputHeader {
                node_id: node_id.into(),
                node_type,
                timestamp: Utc::now(),
                status,
                raw,
            },
            payload,
        }
    }

    /// A best-effort plain-text projection, used by the mapper's fallback
    /// extractor and by prompt-building extractors that just need "what did
    /// the upstream node say".
    pub fn text_content(&self) -> String {
        match &self.payload {
            OutputPayload::AgentOut { text, .. } => text.clone(),
            OutputPayload::ApiOut { body, .. } => body.to_string(),
            OutputPayload::ConditionOut { matched, branch, .. } => format!("{matched} ({branch})"),
            OutputPayload::EvalOut { passed, feedback, .. } => {
                if feedback.is_empty() {
                    passed.to_string()
                } else {
                    feedback.clone()
                }
            }
            OutputPayload::ApprovalOut { approved, comments, .. } => {
                if comments.is_empty() {
                    approved.to_string()
                } else {
                    comments.join("; ")
                }
            }
            OutputPayload::TimerOut { waited_seconds, .. } => waited_seconds.to_string(),
            OutputPayload::MergeOut { merged, .. } => merged.to_string(),
            OutputPayload::EventOut { event_name, payload } => format!("{event_name}: {payload}"),
            OutputPayload::TriggerOut { input, .. } => input.to_string(),
            OutputPayload::EndOut { captured } => captured
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }
}
