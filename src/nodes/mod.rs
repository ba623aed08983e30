//! Node kinds and the factory that turns a DSL [`Node`] into an executable one.

use serde_json::Value;

use crate::dsl::{Edge, Node, NodeKind};
use crate::error::{DefinitionError, NodeError};
use crate::runtime::context::ExecRequest;
use crate::runtime::node::Outcome;

pub mod common;
pub mod expr;
pub mod flow;
pub mod llm;
pub mod tool;

use common::{EndNode, StartNode};
use expr::ExprNode;
use flow::{ExclusiveGateway, ForkGateway, ForkMode};
use llm::LlmNode;
use tool::ToolNode;

/// 可执行节点：每种 kind 对应一个带类型配置的变体
#[derive(Debug)]
pub enum NodeImpl {
    Start(StartNode),
    End(EndNode),
    Llm(LlmNode),
    Tool(ToolNode),
    Expr(ExprNode),
    Exclusive(ExclusiveGateway),
    Fork(ForkGateway),
}

/// Builds the executable form of `node`. Gateways also need their outgoing
/// edges, in declared order, to compile branch conditions.
pub fn build(node: &Node, outgoing: &[&Edge]) -> Result<NodeImpl, DefinitionError> {
    let built = match node.kind {
        NodeKind::Start => NodeImpl::Start(StartNode),
        NodeKind::End => NodeImpl::End(EndNode::prepare(node)),
        NodeKind::Llm => NodeImpl::Llm(LlmNode::prepare(node)?),
        NodeKind::Tool => NodeImpl::Tool(ToolNode::prepare(node)?),
        NodeKind::Expr => NodeImpl::Expr(ExprNode::prepare(node)?),
        NodeKind::Gateway => match node.subref.as_deref().map(str::trim) {
            Some("exclusive") => NodeImpl::Exclusive(ExclusiveGateway::prepare(outgoing)?),
            Some("parallel") => NodeImpl::Fork(ForkGateway::prepare(ForkMode::Parallel, outgoing)?),
            Some("inclusive") => NodeImpl::Fork(ForkGateway::prepare(ForkMode::Inclusive, outgoing)?),
            _ => return Err(DefinitionError::UnknownGateway(node.subref.clone())),
        },
        kind @ (NodeKind::Human | NodeKind::Wait | NodeKind::Iterator) => {
            return Err(DefinitionError::Unsupported(kind));
        }
    };
    Ok(built)
}

impl NodeImpl {
    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        match self {
            NodeImpl::Start(node) => node.execute(req).await,
            NodeImpl::End(node) => node.execute(req).await,
            NodeImpl::Llm(node) => node.execute(req).await,
            NodeImpl::Tool(node) => node.execute(req).await,
            NodeImpl::Expr(node) => node.execute(req).await,
            NodeImpl::Exclusive(node) => node.execute(req).await,
            NodeImpl::Fork(node) => node.execute(req).await,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, NodeImpl::End(_))
    }
}

// --- metadata accessors ---

pub(crate) fn meta_string(node: &Node, field: &'static str) -> Result<Option<String>, DefinitionError> {
    match node.metadata.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid(field, "a string", other)),
    }
}

pub(crate) fn meta_bool(node: &Node, field: &'static str) -> Result<Option<bool>, DefinitionError> {
    match node.metadata.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s == "true" => Ok(Some(true)),
        Some(Value::String(s)) if s == "false" => Ok(Some(false)),
        Some(other) => Err(invalid(field, "a boolean", other)),
    }
}

pub(crate) fn meta_number(node: &Node, field: &'static str) -> Result<Option<f64>, DefinitionError> {
    match node.metadata.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(field, "a number", &Value::String(s.clone()))),
        Some(other) => Err(invalid(field, "a number", other)),
    }
}

fn invalid(field: &'static str, expected: &str, found: &Value) -> DefinitionError {
    DefinitionError::InvalidMetadata {
        field,
        reason: format!("expected {}, found {}", expected, found),
    }
}
