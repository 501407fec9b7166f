//! Engine-level error types (§7 error taxonomy).

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ ValidationError ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// Any other structural rejection (missing trigger/end, bad handle set).
    #[error("workflow definition rejected: {0}")]
    Validation(String),

    // ------ TransientActivityError / TerminalActivityError ------

    /// A node failed with a non-retryable error; the execution is aborted
    /// (after compensation, if applicable).
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal { node_id: String, message: String },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted { node_id: String, message: String },

    // ------ EvalFailure ------

    /// An `eval` node failed with `on_failure=block` (or exhausted `retry`).
    #[error("eval node '{node_id}' failed evaluation: {reason}")]
    EvalFailure { node_id: String, reason: String },

    // ------ ApprovalTimeout ------

    #[error("approval '{node_id}' timed out after {timeout_hours}h")]
    ApprovalTimeout { node_id: String, timeout_hours: f64 },

    // ------ CompensationError ------

    #[error("compensation for node '{node_id}' failed: {message}")]
    CompensationError { node_id: String, message: String },

    // ------ ConditionError ------

    #[error("condition evaluation failed on node '{node_id}': {source}")]
    ConditionError {
        node_id: String,
        #[source]
        source: crate::expr::ConditionError,
    },

    // ------ WorkflowFailure ------

    #[error("workflow execution '{execution_id}' failed: {reason}")]
    WorkflowFailure { execution_id: uuid::Uuid, reason: String },

    /// No node is registered for the resolved current node id.
    #[error("unknown current node '{0}'")]
    UnknownNode(String),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// Event-bus error.
    #[error("event bus error: {0}")]
    Events(#[from] events::EventError),
}
