//! WebSocket fan-out for live workflow/execution event streams.
//!
//! `EventBus::subscribe` hands out one `broadcast::Receiver` per event type;
//! a socket that cares about "everything for this execution" subscribes to
//! every known type and funnels them through a single `mpsc` channel so the
//! write half of the socket only has one stream to drain.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, State},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::AppState;

const TRACKED_EVENT_TYPES: &[&str] = &[
    "workflow.started",
    "workflow.completed",
    "workflow.failed",
    "workflow.canceled",
    "node.started",
    "node.completed",
    "node.failed",
    "approval.granted",
    "approval.denied",
    "timer.started",
    "timer.completed",
    "eval.completed",
    "compensation.started",
    "compensation.completed",
    "compensation.failed",
    "meta.observation",
];

pub async fn execution_stream(
    ws: WebSocketUpgrade,
    Path(execution_id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_socket(socket, state, Filter::Execution(execution_id)))
}

pub async fn workflow_stream(
    ws: WebSocketUpgrade,
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_socket(socket, state, Filter::Workflow(workflow_id)))
}

enum Filter {
    Execution(Uuid),
    Workflow(Uuid),
}

impl Filter {
    fn matches(&self, envelope: &events::EventEnvelope) -> bool {
        match self {
            Filter::Execution(id) => envelope.execution_id() == Some(*id),
            Filter::Workflow(id) => envelope.workflow_id() == Some(*id),
        }
    }
}

async fn run_socket(socket: WebSocket, state: AppState, filter: Filter) {
    let (tx, mut rx) = mpsc::channel::<events::EventEnvelope>(256);

    for event_type in TRACKED_EVENT_TYPES {
        let mut receiver = state.events.subscribe(event_type);
        let tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(envelope) => {
                        if tx.send(envelope).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
    drop(tx);

    let (mut sender, mut receiver) = socket.split();

    let forward = async {
        while let Some(envelope) = rx.recv().await {
            if !filter.matches(&envelope) {
                continue;
            }
            let Ok(text) = serde_json::to_string(&envelope) else { continue };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    };

    let drain_incoming = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = drain_incoming => {}
    }
}
