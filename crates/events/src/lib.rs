//! `events` crate — the event fabric.
//!
//! A single `EventBus` instance is constructed once in `cli::main` and
//! threaded down to the interpreter, queue worker, and API layer. It owns
//! in-process fan-out (`tokio::sync::broadcast`) and drives durable storage
//! through `db::repository::events`.

pub mod bus;
pub mod envelope;
pub mod error;

pub use bus::{EventBus, RetentionConfig};
pub use envelope::{EventEnvelope, EventRecord};
pub use error::EventError;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_envelope() -> EventEnvelope {
        EventEnvelope::new("workflow.started", serde_json::json!({"workflow_id": "abc"})).unwrap()
    }

    #[test]
    fn envelope_round_trips_workflow_id() {
        let envelope =
            EventEnvelope::new("workflow.started", serde_json::json!({"workflow_id": uuid::Uuid::nil()}))
                .unwrap();
        assert_eq!(envelope.workflow_id(), Some(uuid::Uuid::nil()));
        assert_eq!(envelope.execution_id(), None);
    }

    #[test]
    fn envelope_without_ids_returns_none() {
        let envelope = sample_envelope();
        assert_eq!(envelope.execution_id(), None);
    }
}
