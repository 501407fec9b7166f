//! The `(source, target) -> extractor` table.
//!
//! Mirrors the donor's `OutputMapper.MAPPING_RULES` dict-of-dicts, trimmed of
//! the dropped `loop` node type. Every extractor is a pure function of its
//! inputs and must never panic on missing fields — absent data degrades to a
//! minimum viable payload, never an error.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;
use serde_json::{json, Value};

use crate::output::{NodeKind, NodeOutput, OutputPayload};

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

fn parse_duration_seconds(text: &str) -> u64 {
    let re = DURATION_RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*(second|minute|hour|day)s?").expect("static regex")
    });
    let Some(caps) = re.captures(text) else {
        return 0;
    };
    let n: u64 = caps[1].parse().unwrap_or(0);
    match caps[2].to_lowercase().as_str() {
        "second" => n,
        "minute" => n * 60,
        "hour" => n * 3600,
        "day" => n * 86400,
        _ => 0,
    }
}

fn looks_truthy(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    matches!(lower.as_str(), "yes" | "true" | "approve" | "approved")
        || (!lower.is_empty() && !matches!(lower.as_str(), "no" | "false" | "reject" | "rejected"))
}

/// Extract a payload suitable for `target`'s executor from `upstream`'s
/// mapped output. `downstream_config` is the target node's raw config, made
/// available for extractors that need it (none currently do, but the
/// signature stays stable for future rules).
pub fn extract(upstream: &NodeOutput, target: NodeKind, _downstream_config: &Value) -> Value {
    use NodeKind::*;

    match (upstream.header.node_type, target) {
        (Trigger, Agent) => {
            if let OutputPayload::TriggerOut { input, .. } = &upstream.payload {
                json!({ "prompt": upstream.text_content(), "context": input })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }
        (Trigger, Timer) => {
            if let OutputPayload::TriggerOut { input, .. } = &upstream.payload {
                let delay = input
                    .get("delay_seconds")
                    .and_then(Value::as_u64)
                    .or_else(|| {
                        input
                            .get("scheduled_time")
                            .and_then(Value::as_str)
                            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                            .map(|t| (t.timestamp() - chrono::Utc::now().timestamp()).max(0) as u64)
                    })
                    .unwrap_or(0);
                json!({ "duration_seconds": delay })
            } else {
                json!({ "duration_seconds": 0 })
            }
        }
        (Trigger, Conditional) => {
            if let OutputPayload::TriggerOut { input, .. } = &upstream.payload {
                input.clone()
            } else {
                json!({})
            }
        }
        (Trigger, ApiCall) => {
            if let OutputPayload::TriggerOut { input, .. } = &upstream.payload {
                json!({ "body": input })
            } else {
                json!({ "body": {} })
            }
        }

        (Agent, Agent) => {
            if let OutputPayload::AgentOut { text, cost, .. } = &upstream.payload {
                json!({
                    "prompt": text,
                    "previous_agent_output": text,
                    "cost_so_far": cost,
                })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }
        (Agent, Timer) => {
            let text = upstream.text_content();
            let delay = DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(|t| (t.timestamp() - chrono::Utc::now().timestamp()).max(0) as u64)
                .unwrap_or_else(|| parse_duration_seconds(&text));
            json!({ "duration_seconds": delay })
        }
        (Agent, Conditional) => {
            let text = upstream.text_content();
            let value: Option<Value> = serde_json::from_str(text.trim()).ok();
            let matched = match &value {
                Some(Value::Bool(b)) => *b,
                Some(Value::Object(map)) => map
                    .get("result")
                    .and_then(Value::as_bool)
                    .unwrap_or_else(|| looks_truthy(&text)),
                _ => looks_truthy(&text),
            };
            json!({ "matched": matched })
        }
        (Agent, ApiCall) => {
            let text = upstream.text_content();
            match serde_json::from_str::<Value>(text.trim()) {
                Ok(body) => json!({ "body": body }),
                Err(_) => json!({ "body": { "content": text } }),
            }
        }
        (Agent, Eval) => {
            if let OutputPayload::AgentOut { text, model, cost, usage, .. } = &upstream.payload {
                json!({
                    "content": text,
                    "metadata": { "model": model, "cost": cost, "tokens": usage },
                })
            } else {
                json!({ "content": upstream.text_content(), "metadata": {} })
            }
        }

        (ApiCall, Agent) => {
            if let OutputPayload::ApiOut { status_code, body, .. } = &upstream.payload {
                json!({
                    "prompt": format!("API response (status {status_code}): {body}"),
                    "api_response": body,
                    "status_code": status_code,
                })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }
        (ApiCall, Conditional) => {
            if let OutputPayload::ApiOut { status_code, .. } = &upstream.payload {
                json!({ "matched": (200..300).contains(status_code) })
            } else {
                json!({ "matched": false })
            }
        }
        (ApiCall, Eval) => {
            if let OutputPayload::ApiOut { body, status_code, response_time_ms, url, .. } = &upstream.payload {
                json!({
                    "content": body,
                    "metadata": { "status_code": status_code, "response_time_ms": response_time_ms, "url": url },
                })
            } else {
                json!({ "content": upstream.text_content(), "metadata": {} })
            }
        }

        (Eval, Conditional) => {
            if let OutputPayload::EvalOut { passed, .. } = &upstream.payload {
                json!({ "matched": passed })
            } else {
                json!({ "matched": false })
            }
        }
        (Eval, Agent) => {
            if let OutputPayload::EvalOut { passed, score, feedback, .. } = &upstream.payload {
                json!({
                    "prompt": format!("Evaluation feedback: {feedback}"),
                    "eval_passed": passed,
                    "eval_score": score,
                })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }

        (Approval, Conditional) => {
            if let OutputPayload::ApprovalOut { approved, .. } = &upstream.payload {
                json!({ "matched": approved })
            } else {
                json!({ "matched": false })
            }
        }
        (Approval, Agent) => {
            if let OutputPayload::ApprovalOut { approved, approver, comments } = &upstream.payload {
                json!({
                    "prompt": format!(
                        "Approval {} by {}: {}",
                        if *approved { "granted" } else { "denied" },
                        approver.clone().unwrap_or_else(|| "unknown".to_string()),
                        comments.join("; "),
                    ),
                    "approved": approved,
                })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }

        (Merge, Agent) => {
            if let OutputPayload::MergeOut { merged, .. } = &upstream.payload {
                json!({ "prompt": merged.to_string() })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }
        (Merge, ApiCall) => {
            if let OutputPayload::MergeOut { merged, .. } = &upstream.payload {
                json!({ "body": merged })
            } else {
                json!({ "body": {} })
            }
        }

        (Event, Agent) => {
            if let OutputPayload::EventOut { event_name, payload } = &upstream.payload {
                json!({ "prompt": format!("Event {event_name}: {payload}") })
            } else {
                json!({ "prompt": upstream.text_content() })
            }
        }

        _ => json!({ "text": upstream.text_content(), "raw": upstream.header.raw }),
    }
}
