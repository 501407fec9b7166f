//! The wire/bus envelope every event is wrapped in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event as seen by a subscriber: `{event_type, data (JSON string), timestamp}`.
///
/// `data` is kept as a serialized string (rather than `serde_json::Value`) so
/// the broadcast channel carries a `Clone`-cheap, already-validated payload —
/// subscribers that only forward bytes (the WS hub) never have to touch it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_type: String,
    pub data: String,
    pub timestamp: i64,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            data: serde_json::to_string(&data)?,
            timestamp: Utc::now().timestamp(),
        })
    }

    /// Best-effort extraction of `workflow_id` from `data`, if present.
    pub fn workflow_id(&self) -> Option<Uuid> {
        let value: serde_json::Value = serde_json::from_str(&self.data).ok()?;
        value.get("workflow_id")?.as_str()?.parse().ok()
    }

    /// Best-effort extraction of `execution_id` from `data`, if present.
    pub fn execution_id(&self) -> Option<Uuid> {
        let value: serde_json::Value = serde_json::from_str(&self.data).ok()?;
        value.get("execution_id")?.as_str()?.parse().ok()
    }
}

/// A durable record of a published event — the row shape stored via
/// `db::repository::events`, reconstructed here for replay callers so they
/// don't have to depend on `db::models` directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub workflow_id: Option<Uuid>,
    pub execution_id: Option<Uuid>,
    pub node_id: Option<String>,
    pub event_type: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl From<db::models::EventLogRow> for EventRecord {
    fn from(row: db::models::EventLogRow) -> Self {
        Self {
            id: row.id,
            workflow_id: row.workflow_id,
            execution_id: row.execution_id,
            node_id: row.node_id,
            event_type: row.event_type,
            data: row.event_data,
            timestamp: row.timestamp,
        }
    }
}
