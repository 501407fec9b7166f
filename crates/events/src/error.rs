//! Typed error type for the events crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] db::DbError),
}
