//! Typed error type for the queue crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Db(#[from] db::DbError),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("malformed job payload: {0}")]
    MalformedPayload(String),

    #[error("workflow definition is not valid JSON: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}
