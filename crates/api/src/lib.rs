//! `api` crate — the REST + WebSocket surface over the workflow engine.
//!
//! REST:
//!   GET/POST    /api/v1/workflows
//!   GET/DELETE  /api/v1/workflows/:id
//!   POST        /api/v1/workflows/:id/execute
//!   GET         /api/v1/executions/:id
//!   POST        /api/v1/executions/:id/pause
//!   POST        /api/v1/executions/:id/resume
//!   POST        /api/v1/executions/:id/cancel
//!   GET         /api/v1/executions/:id/node_executions
//!   GET         /api/v1/executions/:id/events
//!   GET         /api/v1/approvals/:id
//!   POST        /api/v1/approvals/:id/respond
//!   POST        /webhook/:path
//!
//! WebSocket:
//!   GET  /ws/workflows/:id
//!   GET  /ws/executions/:id

pub mod error;
pub mod handlers;
pub mod ws;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use db::DbPool;
use engine::Interpreter;
use events::EventBus;
use nodes::NodeRegistry;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub events: Arc<EventBus>,
    pub registry: Arc<NodeRegistry>,
}

impl AppState {
    pub(crate) fn interpreter(&self) -> Interpreter {
        Interpreter::new(self.pool.clone(), self.registry.clone(), self.events.clone())
    }
}

pub async fn serve(bind: &str, pool: DbPool, events: Arc<EventBus>, registry: Arc<NodeRegistry>) -> Result<(), std::io::Error> {
    let state = AppState { pool, events, registry };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:id", get(handlers::workflows::get).delete(handlers::workflows::delete))
        .route("/workflows/:id/execute", post(handlers::executions::execute))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/pause", post(handlers::executions::pause))
        .route("/executions/:id/resume", post(handlers::executions::resume))
        .route("/executions/:id/cancel", post(handlers::executions::cancel))
        .route("/executions/:id/node_executions", get(handlers::executions::list_node_executions))
        .route("/executions/:id/events", get(handlers::executions::events))
        .route("/approvals/:id", get(handlers::approvals::get))
        .route("/approvals/:id/respond", post(handlers::approvals::respond));

    let ws_router = Router::new()
        .route("/workflows/:id", get(ws::workflow_stream))
        .route("/executions/:id", get(ws::execution_stream));

    let app = Router::new()
        .nest("/api/v1", api_router)
        .nest("/ws", ws_router)
        .route("/webhook/:path", post(handlers::webhooks::handle_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
