use std::sync::Arc;

use crate::compiler::graph::{Graph, NodeIndex};
use crate::dsl::{NodeKind, Parameters};
use crate::nodes::NodeImpl;

/// 编译后的蓝图
///
/// Immutable once compiled; shared by every run of the same workflow.
#[derive(Debug)]
pub struct Blueprint {
    pub id: String,
    pub name: String,
    pub graph: Graph,
    /// Indexed like `graph`, i.e. in declaration order.
    pub nodes: Vec<Arc<CompiledNode>>,
}

/// 蓝图节点: declared inputs plus the prepared node implementation.
#[derive(Debug)]
pub struct CompiledNode {
    pub id: String,
    pub kind: NodeKind,
    pub inputs: Parameters,
    pub node: NodeImpl,
}

impl Blueprint {
    pub fn node(&self, index: NodeIndex) -> &Arc<CompiledNode> {
        &self.nodes[index]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
