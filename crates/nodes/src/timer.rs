//! `timer` node activity — resolves a sleep duration; the actual sleep is
//! performed by the interpreter (a suspension point), not here.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct TimerConfig {
    #[serde(default)]
    duration_seconds: u64,
}

static DURATION_RE: OnceLock<Regex> = OnceLock::new();

fn parse_duration_from_text(text: &str) -> u64 {
    let re = DURATION_RE
        .get_or_init(|| Regex::new(r"(?i)(\d+)\s*(second|minute|hour|day)s?").expect("static regex"));
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

pub struct TimerNode;

#[async_trait]
impl ExecutableNode for TimerNode {
    async fn execute(&self, input: Value, config: &Value, _ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: TimerConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid timer config: {e}")))?;

        let duration_seconds = if config.duration_seconds > 0 {
            config.duration_seconds
        } else if let Some(explicit) = input.get("duration_seconds").and_then(Value::as_u64) {
            explicit
        } else if let Some(text) = input.get("prompt").and_then(Value::as_str).or_else(|| input.as_str()) {
            parse_duration_from_text(text)
        } else {
            0
        };

        Ok(json!({ "duration_seconds": duration_seconds }))
    }
}
