use serde_json::Value;

/// 节点执行结果
///
/// Ordinary nodes produce a value that is merged into the scope under their
/// ID. Gateways produce a route: the IDs of the successors to activate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Value(Value),
    Route(Vec<String>),
}
