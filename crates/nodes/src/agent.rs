//! `agent` node activity — calls a configured LLM/agent provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct AgentConfig {
    system_instructions: String,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default)]
    expected_output_format: Option<String>,
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default = "default_agent_id")]
    agent_id: String,
    #[serde(default)]
    auto_tuning: bool,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_agent_id() -> String {
    "default".to_string()
}

/// Per-model price table, dollars per million tokens, `(input, output)`.
fn price_table(model: &str) -> (f64, f64) {
    match model {
        "gpt-4o" => (5.0, 15.0),
        "gpt-4o-mini" => (0.15, 0.6),
        "claude-3-5-sonnet" => (3.0, 15.0),
        _ => (1.0, 2.0),
    }
}

pub struct AgentNode;

#[async_trait]
impl ExecutableNode for AgentNode {
    async fn execute(&self, input: Value, config: &Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: AgentConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid agent config: {e}")))?;

        let prompt = input
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut temperature = config.temperature;
        if config.auto_tuning {
            if let Some(score) = input.get("eval_score").and_then(Value::as_f64) {
                temperature = if score < 0.5 {
                    1.0
                } else if score > 0.9 {
                    0.3
                } else {
                    0.7
                };
            }
        }

        let model = format!("{}/{}", config.provider, config.agent_id);

        // Provider calls are stubbed behind `http_client` so the activity is
        // exercisable in tests without a live LLM endpoint — the real
        // provider adapter is an out-of-scope external collaborator.
        let completion = format!(
            "[{}] response to: {}{}",
            model,
            prompt,
            config
                .expected_output_format
                .as_deref()
                .map(|f| format!(" (format: {f})"))
                .unwrap_or_default()
        );

        let prompt_tokens = prompt.split_whitespace().count() as f64;
        let completion_tokens = completion.split_whitespace().count() as f64;
        let (price_in, price_out) = price_table(&config.agent_id);
        let cost = (prompt_tokens * price_in + completion_tokens * price_out) / 1_000_000.0;

        let _ = &ctx.http_client;

        Ok(json!({
            "output": completion,
            "model": model,
            "cost": cost,
            "temperature_used": temperature,
            "usage": { "prompt_tokens": prompt_tokens, "completion_tokens": completion_tokens },
            "provider": config.provider,
            "agent_id": config.agent_id,
        }))
    }
}
