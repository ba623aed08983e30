use std::sync::Arc;

use tracing::{debug, info};

use crate::compiler::graph::Graph;
use crate::dsl::{Edge, Workflow};
use crate::error::WorkflowError;
use crate::nodes;
use crate::runtime::blueprint::{Blueprint, CompiledNode};

/// Turns a [`Workflow`] definition into an executable [`Blueprint`].
///
/// Pass 1 resolves edge endpoints and rejects cycles. Pass 2 prepares every
/// node, so malformed metadata or expressions fail here rather than mid-run.
#[derive(Debug, Default)]
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, workflow: &Workflow) -> Result<Blueprint, WorkflowError> {
        // 1. Pass 1: Graph
        let graph = Graph::resolve(workflow)?;

        // 2. Pass 2: Prepare nodes
        let mut compiled = Vec::with_capacity(graph.len());
        for (index, node) in workflow.nodes.iter().enumerate() {
            let outgoing: Vec<&Edge> = graph
                .outgoing(index)
                .into_iter()
                .map(|e| &workflow.edges[graph.edge(e).declared])
                .collect();

            let prepared = nodes::build(node, &outgoing).map_err(|source| WorkflowError::Definition {
                node_id: node.id.clone(),
                kind: node.kind,
                source,
            })?;
            debug!(node_id = %node.id, kind = %node.kind, "node prepared");

            compiled.push(Arc::new(CompiledNode {
                id: node.id.clone(),
                kind: node.kind,
                inputs: node.inputs.clone(),
                node: prepared,
            }));
        }

        info!(
            workflow_id = %workflow.id,
            nodes = compiled.len(),
            edges = graph.edge_count(),
            "workflow compiled"
        );

        Ok(Blueprint {
            id: workflow.id.clone(),
            name: workflow.name.clone(),
            graph,
            nodes: compiled,
        })
    }
}
