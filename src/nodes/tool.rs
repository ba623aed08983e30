use futures::StreamExt;
use serde_json::{Value, json};
use tracing::debug;

use crate::dsl::Node;
use crate::error::{DefinitionError, NodeError};
use crate::nodes::{meta_bool, meta_string};
use crate::runtime::context::ExecRequest;
use crate::runtime::event::EventType;
use crate::runtime::node::Outcome;
use crate::tools::BUILTIN_KIND;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolNode {
    kind: String,
    name: String,
    stream: bool,
}

impl ToolNode {
    pub fn prepare(node: &Node) -> Result<Self, DefinitionError> {
        let name = meta_string(node, "tool_name")?
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or(DefinitionError::MissingMetadata("tool_name"))?;
        let kind = meta_string(node, "tool_kind")?
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| BUILTIN_KIND.to_string());

        Ok(Self {
            kind,
            name,
            stream: meta_bool(node, "stream")?.unwrap_or(false),
        })
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let tool = req
            .registry
            .tool(&self.kind, &self.name)
            .ok_or_else(|| NodeError::ToolNotFound {
                kind: self.kind.clone(),
                name: self.name.clone(),
            })?;

        let args = req.inputs.clone();
        let result = if self.stream && tool.supports_stream() {
            debug!(node_id = %req.node_id, tool = %self.name, "streaming tool");
            let mut stream = tool.stream(args).await.map_err(NodeError::Tool)?;
            let mut collected = Vec::new();
            while let Some(chunk) = stream.next().await {
                req.emit(chunk.clone(), EventType::Chunk).await;
                collected.push(chunk);
            }
            Value::Array(collected)
        } else {
            debug!(node_id = %req.node_id, tool = %self.name, "invoking tool");
            let output = tool.invoke(args).await.map_err(NodeError::Tool)?;
            parse_tool_output(output)
        };

        Ok(Outcome::Value(json!({ "result": result })))
    }
}

/// JSON output is kept structured; anything else stays text.
fn parse_tool_output(output: String) -> Value {
    serde_json::from_str::<Value>(&output).unwrap_or(Value::String(output))
}
