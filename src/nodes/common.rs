use serde_json::{Map, Value};
use tracing::debug;

use crate::dsl::{Node, Parameters};
use crate::error::NodeError;
use crate::runtime::context::ExecRequest;
use crate::runtime::event::{Event, EventType};
use crate::runtime::node::Outcome;
use crate::runtime::scope::{INPUTS_KEY, resolve_parameter};

/// Entry point. Its result is the caller inputs, so `{{start.x}}` and
/// `{{inputs.x}}` name the same value.
#[derive(Debug, Default)]
pub struct StartNode;

impl StartNode {
    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let inputs = req
            .scope
            .raw()
            .get(INPUTS_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(Outcome::Value(inputs))
    }
}

/// Terminal node: binds its declared outputs against the scope.
#[derive(Debug)]
pub struct EndNode {
    outputs: Parameters,
}

impl EndNode {
    pub fn prepare(node: &Node) -> Self {
        Self {
            outputs: node.outputs.clone(),
        }
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let mut outputs = Map::with_capacity(self.outputs.len());

        for (name, param) in &self.outputs {
            let value = resolve_parameter(param, req.scope.flat(), req.policy)?;
            req.events
                .emit(Event::new(name.clone(), value.clone(), EventType::Output))
                .await;
            outputs.insert(name.clone(), value);
        }

        debug!(node_id = %req.node_id, count = outputs.len(), "workflow outputs bound");
        let outputs = Value::Object(outputs);
        req.emit(outputs.clone(), EventType::End).await;
        Ok(Outcome::Value(outputs))
    }
}
