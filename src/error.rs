use std::time::Duration;

use thiserror::Error;

use crate::dsl::{NodeKind, ParamType};

/// Run-level error returned by compilation and execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow {0} has no nodes")]
    EmptyWorkflow(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("node id {0} is reserved for the caller inputs")]
    ReservedNodeId(String),

    #[error("edge {edge} references unknown node {node}")]
    UnknownEdgeEndpoint { edge: String, node: String },

    #[error("workflow contains a cycle through nodes: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("invalid definition for node {node_id} ({kind}): {source}")]
    Definition {
        node_id: String,
        kind: NodeKind,
        #[source]
        source: DefinitionError,
    },

    #[error("node {node_id} ({kind}) failed: {source}")]
    Node {
        node_id: String,
        kind: NodeKind,
        #[source]
        source: NodeError,
    },

    #[error("workflow stalled with unresolved nodes: {}", .pending.join(", "))]
    Stalled { pending: Vec<String> },

    #[error("output {name} is bound by more than one end node ({first}, {second})")]
    ConflictingOutput {
        name: String,
        first: String,
        second: String,
    },

    #[error("workflow run aborted: {0}")]
    Aborted(String),
}

impl WorkflowError {
    /// The failing node, for errors raised by or about a single node.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            WorkflowError::Definition { node_id, .. } | WorkflowError::Node { node_id, .. } => {
                Some(node_id)
            }
            WorkflowError::DuplicateNode(id) | WorkflowError::ReservedNodeId(id) => Some(id),
            _ => None,
        }
    }
}

/// Problems with a node's static definition, detected at compile time.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("node kind {0} cannot be executed")]
    Unsupported(NodeKind),

    #[error("unknown gateway type {0:?}")]
    UnknownGateway(Option<String>),

    #[error("expecting at least two branches for {kind} gateway, found {found}")]
    TooFewBranches { kind: &'static str, found: usize },

    #[error("gateway has more than one default branch")]
    MultipleDefaults,

    #[error("missing metadata field {0}")]
    MissingMetadata(&'static str),

    #[error("metadata field {field} is invalid: {reason}")]
    InvalidMetadata { field: &'static str, reason: String },

    #[error("failed to compile expression {expr:?}: {reason}")]
    Expression { expr: String, reason: String },
}

/// Failure of a single node execution.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("expression {expr:?} failed: {reason}")]
    Expression { expr: String, reason: String },

    #[error("no branch condition matched")]
    NoMatchingBranch,

    #[error("llm provider {0} is not registered")]
    ProviderNotFound(String),

    #[error("tool {kind}/{name} is not registered")]
    ToolNotFound { kind: String, name: String },

    #[error("provider call failed: {0:#}")]
    Provider(#[source] anyhow::Error),

    #[error("tool call failed: {0:#}")]
    Tool(#[source] anyhow::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("node task panicked: {0}")]
    Panicked(String),
}

/// A `{{path}}` reference or literal that could not be turned into a value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BindingError {
    #[error("unresolved binding `{0}`")]
    Unresolved(String),

    #[error("literal {value:?} is not a valid {expected}")]
    InvalidLiteral { value: String, expected: ParamType },
}
