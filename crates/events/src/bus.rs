//! The event fabric: in-process fan-out plus durable, replayable storage.

use dashmap::DashMap;
use db::DbPool;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::envelope::{EventEnvelope, EventRecord};
use crate::error::EventError;

const CHANNEL_CAPACITY: usize = 1024;

/// Ring-buffer retention, in rows, for the two durable stream kinds.
#[derive(Debug, Clone, Copy)]
pub struct RetentionConfig {
    pub workflow_stream: i64,
    pub execution_stream: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            workflow_stream: 10_000,
            execution_stream: 5_000,
        }
    }
}

/// Persistent pub/sub fabric. One broadcast channel per `event_type`, held in
/// a concurrent map so publishers and subscribers never contend on a global
/// lock; a small `parking_lot`-guarded counter map tracks publish volume per
/// type for diagnostics, mirroring the donor orchestrator's WS hub bookkeeping.
pub struct EventBus {
    pool: DbPool,
    channels: DashMap<String, broadcast::Sender<EventEnvelope>>,
    publish_counts: RwLock<std::collections::HashMap<String, u64>>,
    retention: RetentionConfig,
}

impl EventBus {
    pub fn new(pool: DbPool, retention: RetentionConfig) -> Self {
        Self {
            pool,
            channels: DashMap::new(),
            publish_counts: RwLock::new(std::collections::HashMap::new()),
            retention,
        }
    }

    fn sender_for(&self, event_type: &str) -> broadcast::Sender<EventEnvelope> {
        self.channels
            .entry(event_type.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish an event: fan out to in-process subscribers, append to the
    /// workflow/execution streams (ring-buffer trimmed), persist the audit
    /// row. Steps (b)-(d) are best-effort and logged on failure rather than
    /// propagated; only serialization failures (step a) return an error.
    #[instrument(skip(self, data))]
    pub async fn publish(
        &self,
        event_type: &str,
        workflow_id: Option<Uuid>,
        execution_id: Option<Uuid>,
        node_id: Option<&str>,
        data: serde_json::Value,
    ) -> Result<(), EventError> {
        // Stamp the routing ids onto the broadcast payload itself so WS
        // subscribers can filter by workflow/execution without depending on
        // each call site remembering to embed them in `data`.
        let mut enriched = data;
        if let Some(obj) = enriched.as_object_mut() {
            if let Some(id) = workflow_id {
                obj.entry("workflow_id").or_insert_with(|| serde_json::json!(id));
            }
            if let Some(id) = execution_id {
                obj.entry("execution_id").or_insert_with(|| serde_json::json!(id));
            }
            if let Some(id) = node_id {
                obj.entry("node_id").or_insert_with(|| serde_json::json!(id));
            }
        }

        let envelope = EventEnvelope::new(event_type, enriched.clone())?;

        let sender = self.sender_for(event_type);
        let _ = sender.send(envelope.clone());

        *self.publish_counts.write().entry(event_type.to_string()).or_insert(0) += 1;

        let retention = if workflow_id.is_some() && execution_id.is_none() {
            self.retention.workflow_stream
        } else {
            self.retention.execution_stream
        };

        if let Err(err) = db::repository::events::append_event(
            &self.pool,
            workflow_id,
            execution_id,
            node_id,
            event_type,
            enriched,
            retention,
        )
        .await
        {
            warn!(%event_type, error = %err, "failed to persist event record");
        }

        Ok(())
    }

    /// Subscribe to a single event type. Lagging subscribers observe a
    /// `RecvError::Lagged` on the returned receiver rather than silently
    /// losing events unnoticed.
    pub fn subscribe(&self, event_type: &str) -> broadcast::Receiver<EventEnvelope> {
        self.sender_for(event_type).subscribe()
    }

    /// Replay a workflow's durable event stream, oldest first.
    pub async fn replay_workflow(
        &self,
        workflow_id: Uuid,
        from_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<EventRecord>, EventError> {
        let rows = db::repository::events::replay_workflow_stream(&self.pool, workflow_id, from_timestamp).await?;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }

    /// Replay an execution's durable event stream, oldest first.
    pub async fn replay_execution(
        &self,
        execution_id: Uuid,
        from_timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<EventRecord>, EventError> {
        let rows = db::repository::events::replay_execution_stream(&self.pool, execution_id, from_timestamp).await?;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }
}
