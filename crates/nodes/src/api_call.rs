//! `api_call` node activity — issues an HTTP request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Instant;

use crate::{traits::ActivityContext, ExecutableNode, NodeError};

#[derive(Debug, Deserialize)]
struct ApiCallConfig {
    url: String,
    method: String,
    #[serde(default)]
    headers: Value,
    #[serde(default)]
    body: Value,
}

fn merge_body(mut body: Value, upstream: &Value) -> Value {
    let obj = body.as_object_mut().get_or_insert_with(Map::new);

    if let Some(inner_body) = upstream.get("body") {
        if let Some(inner_obj) = inner_body.as_object() {
            for (k, v) in inner_obj {
                obj.insert(k.clone(), v.clone());
            }
        }
    } else if upstream.get("output").is_some() || upstream.get("context").is_some() {
        if let Some(v) = upstream.get("output") {
            obj.insert("input".to_string(), v.clone());
        }
        obj.insert("context".to_string(), upstream.clone());
    } else if let Some(response) = upstream.get("api_response") {
        obj.insert("previous_response".to_string(), response.clone());
    } else if let Some(approved) = upstream.get("approved") {
        obj.insert("approval_action".to_string(), approved.clone());
    } else if let Some(map) = upstream.as_object() {
        for (k, v) in map {
            obj.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    body
}

pub struct ApiCallNode;

#[async_trait]
impl ExecutableNode for ApiCallNode {
    async fn execute(&self, input: Value, config: &Value, ctx: &ActivityContext) -> Result<Value, NodeError> {
        let config: ApiCallConfig = serde_json::from_value(config.clone())
            .map_err(|e| NodeError::Fatal(format!("invalid api_call config: {e}")))?;

        let body = merge_body(config.body, &input);

        let method = reqwest::Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|e| NodeError::Fatal(format!("invalid http method '{}': {e}", config.method)))?;

        let mut request = ctx.http_client.request(method, &config.url).json(&body);
        if let Some(headers) = config.headers.as_object() {
            for (k, v) in headers {
                if let Some(v_str) = v.as_str() {
                    request = request.header(k.as_str(), v_str);
                }
            }
        }

        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            NodeError::Retryable(format!("api_call request error: {e}"))
        })?;

        let status = response.status();
        let response_time_ms = started.elapsed().as_millis() as u64;
        let headers_json: Value = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), json!(v))))
            .collect::<Map<_, _>>()
            .into();

        let response_body: Value = response.json().await.unwrap_or(Value::Null);

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(NodeError::Retryable(format!("api_call returned {status}")));
        }
        if status.is_client_error() {
            return Err(NodeError::Fatal(format!("api_call returned {status}")));
        }

        Ok(json!({
            "status_code": status.as_u16(),
            "body": response_body,
            "headers": headers_json,
            "response_time_ms": response_time_ms,
            "url": config.url,
        }))
    }
}
