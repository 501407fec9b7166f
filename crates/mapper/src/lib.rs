//! `mapper` crate — the inter-node output-mapping layer.
//!
//! Pure, no I/O: the `NodeOutput` tagged union and a total `(source, target)`
//! extraction table. Two calls with the same inputs always yield the same
//! output.

pub mod error;
pub mod extract;
pub mod normalize;
pub mod output;

pub use error::MapperError;
pub use extract::extract;
pub use normalize::normalize;
pub use output::{NodeKind, NodeOutput, OutputHeader, OutputPayload, OutputStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn agent_output(text: &str) -> NodeOutput {
        NodeOutput::new(
            "n1",
            NodeKind::Agent,
            OutputStatus::Success,
            json!({"output": text}),
            OutputPayload::AgentOut {
                text: text.to_string(),
                model: "gpt-test".to_string(),
                cost: 0.01,
                temperature: 0.7,
                usage: json!({"prompt_tokens": 10, "completion_tokens": 5}),
            },
        )
    }

    #[test]
    fn agent_to_agent_chains_prompt() {
        let upstream = agent_output("hello downstream");
        let mapped = extract(&upstream, NodeKind::Agent, &json!({}));
        assert_eq!(mapped["prompt"], "hello downstream");
        assert_eq!(mapped["cost_so_far"], 0.01);
    }

    #[test]
    fn agent_to_conditional_parses_truthy_keywords() {
        let upstream = agent_output("yes, approved");
        let mapped = extract(&upstream, NodeKind::Conditional, &json!({}));
        assert_eq!(mapped["matched"], true);

        let upstream = agent_output("no");
        let mapped = extract(&upstream, NodeKind::Conditional, &json!({}));
        assert_eq!(mapped["matched"], false);
    }

    #[test]
    fn agent_to_conditional_parses_json_bool() {
        let upstream = agent_output("true");
        let mapped = extract(&upstream, NodeKind::Conditional, &json!({}));
        assert_eq!(mapped["matched"], true);
    }

    #[test]
    fn agent_to_api_call_falls_back_to_content_wrapper_on_non_json() {
        let upstream = agent_output("not json at all");
        let mapped = extract(&upstream, NodeKind::ApiCall, &json!({}));
        assert_eq!(mapped["body"]["content"], "not json at all");
    }

    #[test]
    fn unmapped_pair_falls_back_to_text_content() {
        let upstream = agent_output("fallback text");
        let mapped = extract(&upstream, NodeKind::Timer, &json!({}));
        // agent -> timer IS mapped (duration parsing); use event -> timer to hit the true fallback
        assert!(mapped.get("duration_seconds").is_some());

        let event = NodeOutput::new(
            "n2",
            NodeKind::Event,
            OutputStatus::Success,
            json!({}),
            OutputPayload::EventOut {
                event_name: "ping".to_string(),
                payload: json!({"n": 1}),
            },
        );
        let mapped = extract(&event, NodeKind::Timer, &json!({}));
        assert_eq!(mapped["text"], "ping: {\"n\":1}");
    }

    #[test]
    fn api_call_to_conditional_checks_2xx() {
        let upstream = NodeOutput::new(
            "n3",
            NodeKind::ApiCall,
            OutputStatus::Success,
            json!({}),
            OutputPayload::ApiOut {
                status_code: 404,
                body: json!({}),
                headers: json!({}),
                response_time_ms: 12,
                url: "https://example.com".to_string(),
            },
        );
        let mapped = extract(&upstream, NodeKind::Conditional, &json!({}));
        assert_eq!(mapped["matched"], false);
    }
}
