//! Converts a node executor's raw JSON result into a typed [`NodeOutput`].
//!
//! Executors return loosely-typed `serde_json::Value`s (see `nodes::ExecutableNode`);
//! this is the single place that turns that into the tagged union the rest of
//! the system (mapper extraction, history, events) relies on. Missing fields
//! degrade to sensible defaults rather than erroring — normalization must
//! never fail on a well-formed executor result.

use chrono::Utc;
use serde_json::Value;

use crate::output::{NodeKind, NodeOutput, OutputPayload, OutputStatus};

fn str_field(raw: &Value, key: &str, default: &str) -> String {
    raw.get(key).and_then(Value::as_str).unwrap_or(default).to_string()
}

fn f64_field(raw: &Value, key: &str, default: f64) -> f64 {
    raw.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// Build a [`NodeOutput`] from an executor's raw result.
pub fn normalize(node_id: &str, node_type: NodeKind, status: OutputStatus, raw: Value) -> NodeOutput {
    let payload = match node_type {
        NodeKind::Agent => OutputPayload::AgentOut {
            text: str_field(&raw, "output", ""),
            model: str_field(&raw, "model", "unknown"),
            cost: f64_field(&raw, "cost", 0.0),
            temperature: f64_field(&raw, "temperature_used", 0.7),
            usage: raw.get("usage").cloned().unwrap_or_else(|| Value::Object(Default::default())),
        },
        NodeKind::ApiCall => OutputPayload::ApiOut {
            status_code: raw.get("status_code").and_then(Value::as_u64).unwrap_or(0) as u16,
            body: raw.get("body").cloned().unwrap_or(Value::Null),
            headers: raw.get("headers").cloned().unwrap_or_else(|| Value::Object(Default::default())),
            response_time_ms: raw.get("response_time_ms").and_then(Value::as_u64).unwrap_or(0),
            url: str_field(&raw, "url", ""),
        },
        NodeKind::Conditional => OutputPayload::ConditionOut {
            matched: raw.get("matched").and_then(Value::as_bool).unwrap_or(false),
            branch: str_field(&raw, "branch", if raw.get("matched").and_then(Value::as_bool).unwrap_or(false) { "true" } else { "false" }),
            evaluation: raw.get("evaluation").cloned().unwrap_or(Value::Null),
        },
        NodeKind::Eval => OutputPayload::EvalOut {
            passed: raw.get("passed").and_then(Value::as_bool).unwrap_or(false),
            score: f64_field(&raw, "score", 0.0),
            feedback: str_field(&raw, "reason", ""),
            criteria: raw.get("data").cloned().unwrap_or(Value::Null),
            on_failure: str_field(&raw, "on_failure", "block"),
        },
        NodeKind::Approval => OutputPayload::ApprovalOut {
            approved: raw.get("approved").and_then(Value::as_bool).unwrap_or(false),
            approver: raw.get("approver").and_then(Value::as_str).map(str::to_string),
            comments: raw
                .get("comments")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        },
        NodeKind::Timer => OutputPayload::TimerOut {
            waited_seconds: raw
                .get("waited_seconds")
                .or_else(|| raw.get("duration_seconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0),
            completed_at: Utc::now(),
        },
        NodeKind::Merge => OutputPayload::MergeOut {
            merged: raw.get("merged").cloned().unwrap_or(raw.clone()),
            sources: raw
                .get("sources")
                .and_then(Value::as_array)
                .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            strategy: str_field(&raw, "strategy", "combine"),
        },
        NodeKind::Event => OutputPayload::EventOut {
            event_name: str_field(&raw, "channel", ""),
            payload: raw.get("payload").cloned().unwrap_or(Value::Null),
        },
        NodeKind::Trigger => OutputPayload::TriggerOut {
            input: raw.get("input").cloned().unwrap_or(Value::Null),
            trigger_type: str_field(&raw, "trigger_type", "manual"),
        },
        NodeKind::End => OutputPayload::EndOut {
            captured: raw.get("captured").cloned(),
        },
    };

    NodeOutput::new(node_id, node_type, status, raw, payload)
}
