pub mod approvals;
pub mod executions;
pub mod webhooks;
pub mod workflows;
