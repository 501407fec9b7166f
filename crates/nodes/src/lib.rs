//! `nodes` crate — the `ExecutableNode` trait and built-in node implementations.
//!
//! Every node — built-in and plugin alike — must implement [`ExecutableNode`].
//! The engine crate dispatches execution through this trait object via
//! [`registry::NodeRegistry`].

pub mod agent;
pub mod api_call;
pub mod approval;
pub mod conditional;
pub mod error;
pub mod event;
pub mod eval;
pub mod merge;
pub mod mock;
pub mod registry;
pub mod timer;
pub mod traits;
pub mod trigger;

pub use error::NodeError;
pub use registry::NodeRegistry;
pub use traits::{ActivityContext, ExecutableNode};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn conditional_echoes_matched_flag() {
        let registry = NodeRegistry::default();
        let ctx = test_ctx();
        let out = registry
            .dispatch("conditional", json!({"matched": true}), &json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["matched"], true);
        assert_eq!(out["branch"], "true");
    }

    #[tokio::test]
    async fn trigger_returns_workflow_input() {
        let registry = NodeRegistry::default();
        let ctx = test_ctx();
        let out = registry
            .dispatch("trigger", json!({}), &json!({"type": "manual"}), &ctx)
            .await
            .unwrap();
        assert_eq!(out["input"], json!({"foo": "bar"}));
        assert_eq!(out["trigger_type"], "manual");
    }

    #[tokio::test]
    async fn unknown_node_type_is_fatal() {
        let registry = NodeRegistry::default();
        let ctx = test_ctx();
        let err = registry.dispatch("fork", json!({}), &json!({}), &ctx).await.unwrap_err();
        assert!(matches!(err, NodeError::Fatal(_)));
    }

    fn test_ctx() -> ActivityContext {
        // `connect_lazy` builds a pool without opening a connection, so this
        // stays usable in unit tests with no live Postgres — fine for the
        // executors exercised here (conditional, trigger), which never touch
        // `ctx.db`/`ctx.events`.
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool construction does not connect");
        let events = events::EventBus::new(pool.clone(), events::RetentionConfig::default());

        ActivityContext {
            workflow_id: uuid::Uuid::nil(),
            execution_id: uuid::Uuid::nil(),
            workflow_input: json!({"foo": "bar"}),
            secrets: Default::default(),
            http_client: reqwest::Client::new(),
            db: pool,
            events: std::sync::Arc::new(events),
        }
    }
}
