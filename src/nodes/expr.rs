use evalexpr::{
    ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Node as EvalNode,
    build_operator_tree,
};
use serde_json::{Map, Value, json};

use crate::dsl::Node;
use crate::error::{DefinitionError, NodeError};
use crate::runtime::context::ExecRequest;
use crate::runtime::node::Outcome;
use crate::runtime::scope::flatten;

type EvalValue = evalexpr::Value<DefaultNumericTypes>;

/// A pre-compiled evalexpr AST together with its source.
#[derive(Debug)]
pub struct Expression {
    source: String,
    tree: EvalNode<DefaultNumericTypes>,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, DefinitionError> {
        let tree = build_operator_tree::<DefaultNumericTypes>(source).map_err(|e| {
            DefinitionError::Expression {
                expr: source.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            source: source.to_string(),
            tree,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, ctx: &HashMapContext<DefaultNumericTypes>) -> Result<Value, NodeError> {
        self.tree
            .eval_with_context(ctx)
            .map(from_eval_value)
            .map_err(|e| self.failure(e))
    }

    pub fn eval_boolean(&self, ctx: &HashMapContext<DefaultNumericTypes>) -> Result<bool, NodeError> {
        self.tree
            .eval_boolean_with_context(ctx)
            .map_err(|e| self.failure(e))
    }

    fn failure(&self, err: impl ToString) -> NodeError {
        NodeError::Expression {
            expr: self.source.clone(),
            reason: err.to_string(),
        }
    }
}

/// Builds the evaluation context: every scalar of `inputs` becomes a variable
/// named by its dotted path (`inputs.x`, `search.result.0`).
pub fn build_context(inputs: &Map<String, Value>) -> Result<HashMapContext<DefaultNumericTypes>, NodeError> {
    let mut ctx = HashMapContext::<DefaultNumericTypes>::new();
    for (key, value) in flatten(inputs) {
        let Some(ev) = to_eval_value(&value) else {
            continue;
        };
        ctx.set_value(key.clone(), ev).map_err(|e| NodeError::Expression {
            expr: key,
            reason: e.to_string(),
        })?;
    }
    Ok(ctx)
}

fn to_eval_value(value: &Value) -> Option<EvalValue> {
    match value {
        Value::String(s) => Some(EvalValue::String(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(EvalValue::Int(i))
            } else {
                n.as_f64().map(EvalValue::Float)
            }
        }
        Value::Bool(b) => Some(EvalValue::Boolean(*b)),
        Value::Null => Some(EvalValue::Empty),
        Value::Array(items) => items
            .iter()
            .map(to_eval_value)
            .collect::<Option<Vec<_>>>()
            .map(EvalValue::Tuple),
        Value::Object(_) => None,
    }
}

fn from_eval_value(value: EvalValue) -> Value {
    match value {
        EvalValue::String(s) => Value::String(s),
        EvalValue::Int(i) => json!(i),
        EvalValue::Float(f) => json!(f),
        EvalValue::Boolean(b) => Value::Bool(b),
        EvalValue::Tuple(items) => Value::Array(items.into_iter().map(from_eval_value).collect()),
        EvalValue::Empty => Value::Null,
    }
}

/// Inline transform: evaluates `metadata.expr` against the node inputs and
/// stores the bare result.
#[derive(Debug)]
pub struct ExprNode {
    expression: Option<Expression>,
}

impl ExprNode {
    pub fn prepare(node: &Node) -> Result<Self, DefinitionError> {
        let source = match node.metadata.get("expr") {
            None | Some(Value::Null) => "",
            Some(Value::String(s)) => s.trim(),
            Some(other) => {
                return Err(DefinitionError::InvalidMetadata {
                    field: "expr",
                    reason: format!("expected a string, found {}", other),
                });
            }
        };
        let expression = if source.is_empty() {
            None
        } else {
            Some(Expression::compile(source)?)
        };
        Ok(Self { expression })
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let Some(expression) = &self.expression else {
            return Ok(Outcome::Value(Value::Null));
        };
        let ctx = build_context(&req.inputs)?;
        expression.eval(&ctx).map(Outcome::Value)
    }
}
