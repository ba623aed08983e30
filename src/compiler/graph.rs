use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex as GraphNode};
use petgraph::visit::EdgeRef;

use crate::dsl::Workflow;
use crate::error::WorkflowError;
use crate::runtime::scope::INPUTS_KEY;

pub type NodeIndex = usize;
pub type EdgeIndex = usize;

/// An edge with both endpoints resolved to node indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedEdge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    /// Position of the edge in `Workflow::edges`.
    pub declared: usize,
}

/// Static relations of a workflow: adjacency, indegree and topological order.
///
/// Node indices follow the declaration order of `Workflow::nodes`, edge
/// indices the declaration order of `Workflow::edges`.
#[derive(Debug, Clone)]
pub struct Graph {
    /// Node weight is the node ID, edge weight the declared edge position.
    inner: DiGraph<String, usize>,
    index: HashMap<String, NodeIndex>,
    order: Vec<NodeIndex>,
    position: Vec<usize>,
}

impl Graph {
    /// Builds the graph and validates the workflow is a DAG.
    pub fn resolve(workflow: &Workflow) -> Result<Self, WorkflowError> {
        if workflow.nodes.is_empty() {
            return Err(WorkflowError::EmptyWorkflow(workflow.id.clone()));
        }

        let mut inner = DiGraph::with_capacity(workflow.nodes.len(), workflow.edges.len());
        let mut index = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            if node.id == INPUTS_KEY {
                return Err(WorkflowError::ReservedNodeId(node.id.clone()));
            }
            if index.contains_key(&node.id) {
                return Err(WorkflowError::DuplicateNode(node.id.clone()));
            }
            let idx = inner.add_node(node.id.clone());
            index.insert(node.id.clone(), idx.index());
        }

        for (declared, edge) in workflow.edges.iter().enumerate() {
            let lookup = |id: &str| {
                index
                    .get(id)
                    .map(|&i| GraphNode::new(i))
                    .ok_or_else(|| WorkflowError::UnknownEdgeEndpoint {
                        edge: edge_label(&edge.id, &edge.source, &edge.target),
                        node: id.to_string(),
                    })
            };
            let source = lookup(&edge.source)?;
            let target = lookup(&edge.target)?;
            inner.add_edge(source, target, declared);
        }

        let sorted = toposort(&inner, None).map_err(|_| WorkflowError::Cycle(cycle_members(&inner)))?;

        // Canonical order: longest-path depth first, declaration order within a depth.
        let mut depth = vec![0usize; inner.node_count()];
        for &node in &sorted {
            for edge in inner.edges_directed(node, Direction::Outgoing) {
                let target = edge.target().index();
                depth[target] = depth[target].max(depth[node.index()] + 1);
            }
        }
        let mut order: Vec<NodeIndex> = (0..inner.node_count()).collect();
        order.sort_by_key(|&i| (depth[i], i));

        let mut position = vec![0; order.len()];
        for (pos, &node) in order.iter().enumerate() {
            position[node] = pos;
        }

        Ok(Self {
            inner,
            index,
            order,
            position,
        })
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub fn node_id(&self, index: NodeIndex) -> &str {
        &self.inner[GraphNode::new(index)]
    }

    pub fn edge(&self, index: EdgeIndex) -> ResolvedEdge {
        let edge = &self.inner.raw_edges()[index];
        ResolvedEdge {
            source: edge.source().index(),
            target: edge.target().index(),
            declared: edge.weight,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Outgoing edges of `node` in declaration order.
    pub fn outgoing(&self, node: NodeIndex) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .inner
            .edges_directed(GraphNode::new(node), Direction::Outgoing)
            .map(|e| e.id().index())
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn indegree(&self, node: NodeIndex) -> usize {
        self.inner
            .edges_directed(GraphNode::new(node), Direction::Incoming)
            .count()
    }

    /// 入度为0的起始节点, in declaration order.
    pub fn entry_nodes(&self) -> Vec<NodeIndex> {
        (0..self.len()).filter(|&i| self.indegree(i) == 0).collect()
    }

    pub fn topo_order(&self) -> &[NodeIndex] {
        &self.order
    }

    pub fn topo_position(&self, node: NodeIndex) -> usize {
        self.position[node]
    }
}

/// IDs of every node that sits on a cycle, in declaration order.
fn cycle_members(graph: &DiGraph<String, usize>) -> Vec<String> {
    let mut members: Vec<GraphNode> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .collect();
    members.sort_unstable();
    members.into_iter().map(|n| graph[n].clone()).collect()
}

fn edge_label(id: &str, source: &str, target: &str) -> String {
    if id.is_empty() {
        format!("{}-{}", source, target)
    } else {
        id.to_string()
    }
}
