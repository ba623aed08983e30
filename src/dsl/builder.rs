use crate::dsl::{Edge, Node, NodeKind, ParamType, Parameter, Workflow};
use serde_json::{Map, Value};

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// 添加节点. A node whose ID is already present is kept as is, so chains
    /// can be continued from an existing node by passing it again.
    pub fn add_node(&mut self, node: Node) -> &mut Self {
        if !self.nodes.iter().any(|n| n.id == node.id) {
            self.nodes.push(node);
        }
        self
    }

    pub fn add_edge(&mut self, edge: Edge) -> &mut Self {
        let exists = self.edges.iter().any(|e| {
            e.source == edge.source && e.target == edge.target && e.express == edge.express
        });
        if !exists {
            self.edges.push(edge);
        }
        self
    }

    /// 链接节点: appends the nodes and chains them with unconditional edges
    /// in call order.
    pub fn link(&mut self, nodes: impl IntoIterator<Item = Node>) -> &mut Self {
        let mut previous: Option<String> = None;
        for node in nodes {
            let id = node.id.clone();
            self.add_node(node);
            if let Some(source) = previous.take() {
                self.add_edge(Edge::new(source, id.clone()));
            }
            previous = Some(id);
        }
        self
    }

    /// Attaches `node` to `source` through a conditional edge, then continues
    /// unconditionally through `more`.
    pub fn link_with_condition(
        &mut self,
        source: &str,
        express: &str,
        node: Node,
        more: impl IntoIterator<Item = Node>,
    ) -> &mut Self {
        self.add_edge(Edge::conditional(source, node.id.clone(), express));
        self.link(std::iter::once(node).chain(more))
    }

    pub fn connect(&mut self, source: &str, target: &str) -> &mut Self {
        self.add_edge(Edge::new(source, target))
    }

    pub fn connect_if(&mut self, source: &str, target: &str, express: &str) -> &mut Self {
        self.add_edge(Edge::conditional(source, target, express))
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn build(&mut self) -> Workflow {
        std::mem::take(self)
    }
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            kind,
            subref: None,
            inputs: Default::default(),
            outputs: Default::default(),
            metadata: Map::new(),
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Start)
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::End)
    }

    pub fn expr(id: impl Into<String>, expr: &str) -> Self {
        Self::new(id, NodeKind::Expr).meta("expr", expr)
    }

    pub fn tool(id: impl Into<String>, tool_name: &str) -> Self {
        Self::new(id, NodeKind::Tool).meta("tool_name", tool_name)
    }

    pub fn llm(id: impl Into<String>, provider: &str, model: &str) -> Self {
        Self::new(id, NodeKind::Llm)
            .meta("provider", provider)
            .meta("model", model)
    }

    pub fn exclusive_gateway(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Gateway).subref("exclusive")
    }

    pub fn fork_gateway(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Gateway).subref("parallel")
    }

    pub fn inclusive_gateway(id: impl Into<String>) -> Self {
        Self::new(id, NodeKind::Gateway).subref("inclusive")
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn subref(mut self, subref: impl Into<String>) -> Self {
        self.subref = Some(subref.into());
        self
    }

    pub fn input(mut self, name: &str, value: impl Into<String>) -> Self {
        self.inputs.insert(name.to_string(), Parameter::new(value));
        self
    }

    pub fn typed_input(mut self, name: &str, value: impl Into<String>, kind: ParamType) -> Self {
        self.inputs
            .insert(name.to_string(), Parameter::typed(value, kind));
        self
    }

    pub fn output(mut self, name: &str, value: impl Into<String>) -> Self {
        self.outputs.insert(name.to_string(), Parameter::new(value));
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
