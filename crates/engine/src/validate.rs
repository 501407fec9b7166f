//! Structural validation for a [`WorkflowDefinition`].
//!
//! Deliberately NOT a topological sort: cycles and unreachable nodes are
//! permitted (§7, §9 Design Notes). This only rejects documents that the
//! interpreter could not even begin to walk.

use std::collections::HashSet;

use serde_json::Value;

use crate::{
    error::EngineError,
    models::{NodeType, WorkflowDefinition},
};

/// A required config field is present and, if a string, non-empty (§6's
/// config field tables, §7 "missing required config field").
fn has_required_field(config: &Value, field: &str) -> bool {
    match config.get(field) {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

fn missing_config_err(node_id: &str, node_type: &str, field: &str) -> EngineError {
    EngineError::Validation(format!(
        "{node_type} node '{node_id}' is missing required config field '{field}'"
    ))
}

/// Validate a workflow definition's structure.
///
/// Checks: unique node ids, every edge endpoint resolves to a real node,
/// required config fields per node type (§6), exactly the handles a
/// `conditional`/`approval` node's outgoing edges need
/// are present, and at least one `trigger` and one `end` node exist.
pub fn validate(def: &WorkflowDefinition) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for node in &def.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &def.edges {
        if def.node(&edge.source).is_none() {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.source.clone(),
                side: "source",
            });
        }
        if def.node(&edge.target).is_none() {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.target.clone(),
                side: "target",
            });
        }
    }

    if !def.nodes.iter().any(|n| n.node_type == NodeType::Trigger) {
        return Err(EngineError::Validation("workflow has no trigger node".to_string()));
    }
    if !def.nodes.iter().any(|n| n.node_type == NodeType::End) {
        return Err(EngineError::Validation("workflow has no end node".to_string()));
    }

    for node in &def.nodes {
        match node.node_type {
            NodeType::Agent => {
                if !has_required_field(&node.config, "system_instructions") {
                    return Err(missing_config_err(&node.id, "agent", "system_instructions"));
                }
            }
            NodeType::ApiCall => {
                for field in ["url", "method"] {
                    if !has_required_field(&node.config, field) {
                        return Err(missing_config_err(&node.id, "api_call", field));
                    }
                }
            }
            NodeType::Eval => {
                if !has_required_field(&node.config, "eval_type") {
                    return Err(missing_config_err(&node.id, "eval", "eval_type"));
                }
            }
            NodeType::Event => {
                for field in ["channel", "operation"] {
                    if !has_required_field(&node.config, field) {
                        return Err(missing_config_err(&node.id, "event", field));
                    }
                }
            }
            NodeType::Conditional => {
                let handles: HashSet<&str> = def
                    .outgoing_edges(&node.id)
                    .into_iter()
                    .filter_map(|e| e.source_handle.as_deref())
                    .collect();
                if !handles.is_empty() && !handles.contains("true") && !handles.contains("false") {
                    return Err(EngineError::Validation(format!(
                        "conditional node '{}' has labeled outgoing edges but none handled 'true'/'false'",
                        node.id
                    )));
                }
            }
            NodeType::Approval => {
                if !has_required_field(&node.config, "description") {
                    return Err(missing_config_err(&node.id, "approval", "description"));
                }
                let handles: HashSet<&str> = def
                    .outgoing_edges(&node.id)
                    .into_iter()
                    .filter_map(|e| e.source_handle.as_deref())
                    .collect();
                if !handles.is_empty() && !handles.contains("approve") && !handles.contains("reject") {
                    return Err(EngineError::Validation(format!(
                        "approval node '{}' has labeled outgoing edges but none handled 'approve'/'reject'",
                        node.id
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, Node};
    use serde_json::json;

    fn node(id: &str, node_type: NodeType) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            label: String::new(),
            position: None,
            config: json!({}),
        }
    }

    fn node_with_config(id: &str, node_type: NodeType, config: Value) -> Node {
        Node { config, ..node(id, node_type) }
    }

    #[test]
    fn accepts_a_minimal_linear_workflow() {
        let def = WorkflowDefinition::new(
            "linear",
            vec![node("t", NodeType::Trigger), node("e", NodeType::End)],
            vec![Edge {
                id: "e1".to_string(),
                source: "t".to_string(),
                target: "e".to_string(),
                source_handle: None,
                condition: None,
            }],
        );
        assert!(validate(&def).is_ok());
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let def = WorkflowDefinition::new(
            "dup",
            vec![node("t", NodeType::Trigger), node("t", NodeType::End)],
            vec![],
        );
        assert!(matches!(validate(&def), Err(EngineError::DuplicateNodeId(_))));
    }

    #[test]
    fn rejects_dangling_edge() {
        let def = WorkflowDefinition::new(
            "dangling",
            vec![node("t", NodeType::Trigger), node("e", NodeType::End)],
            vec![Edge {
                id: "e1".to_string(),
                source: "t".to_string(),
                target: "ghost".to_string(),
                source_handle: None,
                condition: None,
            }],
        );
        assert!(matches!(
            validate(&def),
            Err(EngineError::UnknownNodeReference { .. })
        ));
    }

    #[test]
    fn permits_a_cycle() {
        let def = WorkflowDefinition::new(
            "cycle",
            vec![
                node("t", NodeType::Trigger),
                node_with_config("a", NodeType::Agent, json!({"system_instructions": "be helpful"})),
                node("e", NodeType::End),
            ],
            vec![
                Edge { id: "e1".to_string(), source: "t".to_string(), target: "a".to_string(), source_handle: None, condition: None },
                Edge { id: "e2".to_string(), source: "a".to_string(), target: "a".to_string(), source_handle: None, condition: None },
                Edge { id: "e3".to_string(), source: "a".to_string(), target: "e".to_string(), source_handle: None, condition: None },
            ],
        );
        assert!(validate(&def).is_ok());
    }

    #[test]
    fn rejects_agent_node_missing_system_instructions() {
        let def = WorkflowDefinition::new(
            "bad-agent",
            vec![node("t", NodeType::Trigger), node("a", NodeType::Agent), node("e", NodeType::End)],
            vec![
                Edge { id: "e1".to_string(), source: "t".to_string(), target: "a".to_string(), source_handle: None, condition: None },
                Edge { id: "e2".to_string(), source: "a".to_string(), target: "e".to_string(), source_handle: None, condition: None },
            ],
        );
        assert!(matches!(validate(&def), Err(EngineError::Validation(_))));
    }

    #[test]
    fn rejects_api_call_node_missing_url() {
        let def = WorkflowDefinition::new(
            "bad-api-call",
            vec![
                node("t", NodeType::Trigger),
                node_with_config("c", NodeType::ApiCall, json!({"method": "GET"})),
                node("e", NodeType::End),
            ],
            vec![
                Edge { id: "e1".to_string(), source: "t".to_string(), target: "c".to_string(), source_handle: None, condition: None },
                Edge { id: "e2".to_string(), source: "c".to_string(), target: "e".to_string(), source_handle: None, condition: None },
            ],
        );
        assert!(matches!(validate(&def), Err(EngineError::Validation(_))));
    }

    #[test]
    fn accepts_api_call_node_with_url_and_method() {
        let def = WorkflowDefinition::new(
            "good-api-call",
            vec![
                node("t", NodeType::Trigger),
                node_with_config("c", NodeType::ApiCall, json!({"url": "https://example.com", "method": "GET"})),
                node("e", NodeType::End),
            ],
            vec![
                Edge { id: "e1".to_string(), source: "t".to_string(), target: "c".to_string(), source_handle: None, condition: None },
                Edge { id: "e2".to_string(), source: "c".to_string(), target: "e".to_string(), source_handle: None, condition: None },
            ],
        );
        assert!(validate(&def).is_ok());
    }

    #[test]
    fn rejects_approval_node_missing_description() {
        let def = WorkflowDefinition::new(
            "bad-approval",
            vec![node("t", NodeType::Trigger), node("a", NodeType::Approval), node("e", NodeType::End)],
            vec![
                Edge { id: "e1".to_string(), source: "t".to_string(), target: "a".to_string(), source_handle: None, condition: None },
                Edge { id: "e2".to_string(), source: "a".to_string(), target: "e".to_string(), source_handle: None, condition: None },
            ],
        );
        assert!(matches!(validate(&def), Err(EngineError::Validation(_))));
    }
}
