use std::collections::VecDeque;

use crate::compiler::graph::{EdgeIndex, Graph, NodeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Ready,
    Completed,
    Skipped,
}

/// Per-run scheduling state.
///
/// Every incoming edge of a node is eventually resolved, either live (its
/// source completed and selected it) or dead (its source was skipped or a
/// gateway routed elsewhere). A node is ready once all of its incoming edges
/// are resolved and at least one is live; with none live it is skipped, and
/// its own outgoing edges resolve dead in turn.
#[derive(Debug)]
pub struct RunState<'g> {
    graph: &'g Graph,
    states: Vec<NodeState>,
    unresolved: Vec<usize>,
    live: Vec<usize>,
    ready: Vec<NodeIndex>,
}

impl<'g> RunState<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        let n = graph.len();
        let mut state = Self {
            graph,
            states: vec![NodeState::Pending; n],
            unresolved: (0..n).map(|i| graph.indegree(i)).collect(),
            live: vec![0; n],
            ready: Vec::new(),
        };
        for entry in graph.entry_nodes() {
            state.states[entry] = NodeState::Ready;
            state.ready.push(entry);
        }
        state
    }

    /// Drains the ready set in topological order.
    pub fn take_ready(&mut self) -> Vec<NodeIndex> {
        let mut level = std::mem::take(&mut self.ready);
        level.sort_by_key(|&i| self.graph.topo_position(i));
        level
    }

    /// Marks `node` completed. `chosen` lists the successors a gateway routed
    /// to; `None` takes every outgoing edge. Returns the nodes that became
    /// skipped as a consequence, in resolution order.
    pub fn complete(&mut self, node: NodeIndex, chosen: Option<&[NodeIndex]>) -> Vec<NodeIndex> {
        self.states[node] = NodeState::Completed;

        let mut worklist: VecDeque<(EdgeIndex, bool)> = self
            .graph
            .outgoing(node)
            .into_iter()
            .map(|e| {
                let target = self.graph.edge(e).target;
                let live = chosen.is_none_or(|c| c.contains(&target));
                (e, live)
            })
            .collect();

        let mut skipped = Vec::new();
        while let Some((edge, live)) = worklist.pop_front() {
            let target = self.graph.edge(edge).target;
            self.unresolved[target] -= 1;
            if live {
                self.live[target] += 1;
            }
            if self.unresolved[target] > 0 {
                continue;
            }

            if self.live[target] > 0 {
                self.states[target] = NodeState::Ready;
                self.ready.push(target);
            } else {
                self.states[target] = NodeState::Skipped;
                skipped.push(target);
                worklist.extend(self.graph.outgoing(target).into_iter().map(|e| (e, false)));
            }
        }
        skipped
    }

    pub fn state(&self, node: NodeIndex) -> NodeState {
        self.states[node]
    }

    /// Nodes never reached a final state.
    pub fn unresolved(&self) -> Vec<NodeIndex> {
        (0..self.states.len())
            .filter(|&i| matches!(self.states[i], NodeState::Pending | NodeState::Ready))
            .collect()
    }
}
