pub mod builder;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 原始 DSL 定义的 Workflow
///
/// Built once (builder or YAML) and reused as a stateless template across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// DSL 中的节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Llm,
    Tool,
    Expr,
    /// Discriminated by `Node::subref`: exclusive, inclusive or parallel.
    Gateway,
    Human,
    Wait,
    Iterator,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::End => "end",
            NodeKind::Llm => "llm",
            NodeKind::Tool => "tool",
            NodeKind::Expr => "expr",
            NodeKind::Gateway => "gateway",
            NodeKind::Human => "human",
            NodeKind::Wait => "wait",
            NodeKind::Iterator => "iterator",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a parameter. Literals are coerced to it when resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Json,
    #[default]
    Any,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
            ParamType::Json => "json",
            ParamType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A named binding: either a literal or a `{{dotted.path}}` template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterRepr")]
pub struct Parameter {
    pub value: String,
    #[serde(default, rename = "type")]
    pub kind: ParamType,
}

impl Parameter {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: ParamType::Any,
        }
    }

    pub fn typed(value: impl Into<String>, kind: ParamType) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

// YAML accepts both `x: "{{inputs.x}}"` and `x: { value: ..., type: number }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ParameterRepr {
    Full {
        value: Value,
        #[serde(default, rename = "type")]
        kind: ParamType,
    },
    Short(Value),
}

impl From<ParameterRepr> for Parameter {
    fn from(repr: ParameterRepr) -> Self {
        let (value, kind) = match repr {
            ParameterRepr::Full { value, kind } => (value, kind),
            ParameterRepr::Short(value) => (value, ParamType::Any),
        };
        let value = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Parameter { value, kind }
    }
}

pub type Parameters = BTreeMap<String, Parameter>;

/// DSL 中的节点
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subref: Option<String>,
    #[serde(default)]
    pub inputs: Parameters,
    #[serde(default)]
    pub outputs: Parameters,
    /// Kind-specific configuration (provider, model, tool_name, expr, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// DSL 中的边
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
    /// Boolean condition consulted by gateways. `None` means unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub express: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{}-{}", source, target),
            source,
            target,
            express: None,
        }
    }

    pub fn conditional(
        source: impl Into<String>,
        target: impl Into<String>,
        express: impl Into<String>,
    ) -> Self {
        Self {
            express: Some(express.into()),
            ..Self::new(source, target)
        }
    }

    /// The condition, if any, with blank expressions treated as absent.
    pub fn condition(&self) -> Option<&str> {
        self.express
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }
}
