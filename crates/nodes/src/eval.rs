//! `eval` node activity — schema, judge, policy, and custom evaluators.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct EvalConfig {
    eval_type: String,
    #[serde(default)]
    config: Value,
    #[serde(default = "default_on_failure")]
    on_failure: String,
}

fn default_on_failure() -> String {
    "block".to_string()
}

/// Pull the quantity under evaluation out of the upstream mapped input,
/// falling back through `output` → `body` → `value` → the whole object.
fn target_value(input: &Value) -> Value {
    input
        .get("output")
        .or_else(|| input.get("body"))
        .or_else(|| input.get("value"))
        .cloned()
        .unwrap_or_else(|| input.clone())
}

fn eval_schema(target: &Value, schema_config: &Value) -> (bool, f64, String) {
    let Some(schema) = schema_config.get("schema") else {
        return (false, 0.0, "eval config missing 'schema'".to_string());
    };
    match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => {
            let errors: Vec<String> = compiled
                .validate(target)
                .err()
                .map(|iter| iter.map(|e| e.to_string()).collect())
                .unwrap_or_default();
            if errors.is_empty() {
                (true, 1.0, String::new())
            } else {
                (false, 0.0, errors.join("; "))
            }
        }
        Err(e) => (false, 0.0, format!("invalid schema: {e}")),
    }
}

fn eval_llm_judge(target: &Value, judge_config: &Value) -> (bool, f64, String) {
    let confidence_threshold = judge_config
        .get("confidence_threshold")
        .and_then(Value::as_f64)
        .unwrap_or(0.8);

    // The judge model call is an out-of-scope external collaborator; this
    // deterministically scores non-empty content highly so the control flow
    // (on_failure dispatch) is still exercisable end to end.
    let content = target.as_str().map(str::to_string).unwrap_or_else(|| target.to_string());
    let score = if content.trim().is_empty() { 0.0 } else { 0.9 };
    let passed = score >= confidence_threshold;
    (passed, score, format!("judged content of length {}", content.len()))
}

fn eval_policy(target: &Value, policy_config: &Value) -> (bool, f64, String, Value) {
    let mut failed_rules = Vec::new();

    if let Some(limit) = policy_config.get("cost_limit").and_then(Value::as_f64) {
        let cost = target.get("cost").and_then(Value::as_f64).unwrap_or(0.0);
        if cost > limit {
            failed_rules.push(json!({ "rule": "cost_limit", "limit": limit, "actual": cost }));
        }
    }
    if let Some(threshold) = policy_config.get("confidence_threshold").and_then(Value::as_f64) {
        let confidence = target.get("confidence").and_then(Value::as_f64).unwrap_or(1.0);
        if confidence < threshold {
            failed_rules.push(json!({ "rule": "confidence_threshold", "threshold": threshold, "actual": confidence }));
        }
    }
    if policy_config.get("pii_detection").and_then(Value::as_bool).unwrap_or(false) {
        let text = target.as_str().unwrap_or_default();
        let looks_like_email = text.contains('@') && text.contains('.');
        if looks_like_email {
            failed_rules.push(json!({ "rule": "pii_detection", "reason": "possible email address detected" }));
        }
    }

    let passed = failed_rules.is_empty();
    let score = if passed { 1.0 } else { 0.0 };
    let reason = if passed { String::new() } else { "one or more policy rules failed".to_string() };
    (passed, score, reason, json!({ "failed_rules": failed_rules }))
}

pub struct EvalNode;

#[async_trait]
impl ExecutableNode for EvalNode {
    async fn execute(&self, input: Value, config: &Value, _ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: EvalConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid eval config: {e}")))?;

        let target = target_value(&input);

        let (passed, score, reason, data) = match config.eval_type.as_str() {
            "schema" => {
                let (p, s, r) = eval_schema(&target, &config.config);
                (p, s, r, Value::Null)
            }
            "llm_judge" => {
                let (p, s, r) = eval_llm_judge(&target, &config.config);
                (p, s, r, Value::Null)
            }
            "policy" => eval_policy(&target, &config.config),
            "custom" => (true, 1.0, "custom eval not implemented".to_string(), Value::Null),
            other => return Err(NodeError::Fatal(format!("unknown eval_type '{other}'"))),
        };

        Ok(json!({
            "passed": passed,
            "score": score,
            "reason": reason,
            "data": data,
            "on_failure": config.on_failure,
        }))
    }
}
