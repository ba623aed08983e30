//! flowdag: a workflow DAG execution engine for LLM agent pipelines.
//!
//! A [`Workflow`] is compiled into a [`Blueprint`](runtime::blueprint::Blueprint)
//! and executed level by level by the [`Executor`].

pub mod compiler;
pub mod dsl;
pub mod error;
pub mod llm;
pub mod nodes;
pub mod runtime;
pub mod tools;

pub use dsl::{Edge, Node, NodeKind, Parameter, Workflow};
pub use error::{BindingError, DefinitionError, NodeError, WorkflowError};
pub use runtime::event::{Event, EventType};
pub use runtime::executor::{Executor, RunHandle, RunResult};
pub use runtime::registry::Registry;
