//! The job-queue worker loop.
//!
//! Polls `job_queue` with `SELECT … FOR UPDATE SKIP LOCKED` (see
//! `db::repository::jobs::fetch_next_job`), decodes each row's `payload`
//! envelope, and drives the matching `Interpreter` entry point. A job that
//! fails is retried up to `max_attempts` before it is dead-lettered; the
//! interpreter's own retry/backoff policy (per node type) is a separate,
//! finer-grained concern handled inside `step()`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use db::DbPool;
use engine::{Interpreter, WorkflowDefinition};
use events::EventBus;
use nodes::NodeRegistry;

use crate::error::QueueError;

/// The envelope stored in `job_queue.payload`. `kind` selects which
/// `Interpreter` entry point the worker calls.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JobPayload {
    Start {
        #[serde(default)]
        input: Value,
    },
    Resume,
    Signal {
        action: String,
        #[serde(default)]
        approver: Option<String>,
        #[serde(default)]
        comment: Option<String>,
    },
}

pub struct Worker {
    pool: DbPool,
    interpreter: Interpreter,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(pool: DbPool, registry: Arc<NodeRegistry>, events: Arc<EventBus>) -> Self {
        Self {
            interpreter: Interpreter::new(pool.clone(), registry, events),
            pool,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run forever, polling for work. Intended to be the body of the CLI's
    /// `worker` subcommand.
    pub async fn run(&self) -> ! {
        info!("queue worker starting, poll_interval={:?}", self.poll_interval);
        loop {
            match db::repository::jobs::fetch_next_job(&self.pool).await {
                Ok(Some(job)) => {
                    let job_id = job.id;
                    let max_attempts = job.max_attempts;
                    if let Err(err) = self.process_job(job).await {
                        error!(job_id = %job_id, error = %err, "job processing failed");
                        if let Err(e) = db::repository::jobs::fail_job(&self.pool, job_id, max_attempts).await {
                            error!(job_id = %job_id, error = %e, "failed to mark job as failed");
                        }
                        continue;
                    }
                    if let Err(e) = db::repository::jobs::complete_job(&self.pool, job_id).await {
                        error!(job_id = %job_id, error = %e, "failed to mark job as completed");
                    }
                }
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(err) => {
                    warn!(error = %err, "failed to poll job queue, backing off");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    async fn process_job(&self, job: db::models::JobRow) -> Result<(), QueueError> {
        let payload: JobPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| QueueError::MalformedPayload(e.to_string()))?;

        let workflow_row = db::repository::workflows::get_workflow(&self.pool, job.workflow_id).await?;
        let def: WorkflowDefinition = serde_json::from_value(workflow_row.definition)?;
        engine::validate(&def)?;

        let outcome = match payload {
            JobPayload::Start { input } => {
                self.interpreter.start_queued(&def, job.execution_id, input).await?
            }
            JobPayload::Resume => self.interpreter.resume(&def, job.execution_id).await?,
            JobPayload::Signal { action, approver, comment } => {
                self.interpreter
                    .approval_signal(&def, job.execution_id, &action, approver, comment)
                    .await?
            }
        };

        info!(execution_id = %job.execution_id, ?outcome, "job step complete");
        Ok(())
    }
}

/// Enqueue a `start` job for a freshly-created execution row.
pub async fn enqueue_start(pool: &DbPool, execution_id: Uuid, workflow_id: Uuid, input: Value) -> Result<db::models::JobRow, QueueError> {
    let payload = serde_json::json!({"kind": "start", "input": input});
    Ok(db::repository::jobs::enqueue_job(pool, execution_id, workflow_id, payload).await?)
}

/// Enqueue a `resume` job, e.g. after `unpause` or a timer-driven wakeup.
pub async fn enqueue_resume(pool: &DbPool, execution_id: Uuid, workflow_id: Uuid) -> Result<db::models::JobRow, QueueError> {
    let payload = serde_json::json!({"kind": "resume"});
    Ok(db::repository::jobs::enqueue_job(pool, execution_id, workflow_id, payload).await?)
}

/// Enqueue a `signal` job carrying an approval response.
pub async fn enqueue_signal(
    pool: &DbPool,
    execution_id: Uuid,
    workflow_id: Uuid,
    action: &str,
    approver: Option<String>,
    comment: Option<String>,
) -> Result<db::models::JobRow, QueueError> {
    let payload = serde_json::json!({"kind": "signal", "action": action, "approver": approver, "comment": comment});
    Ok(db::repository::jobs::enqueue_job(pool, execution_id, workflow_id, payload).await?)
}
