//! `engine` crate — domain models, structural validation, and the workflow interpreter.

pub mod compensation;
pub mod context;
pub mod error;
pub mod expr;
pub mod interpreter;
pub mod models;
pub mod selfhealing;
pub mod validate;

pub use context::ExecutionContext;
pub use error::EngineError;
pub use interpreter::{Interpreter, Outcome};
pub use models::{Edge, Node, NodeType, WorkflowDefinition};
pub use validate::validate;
