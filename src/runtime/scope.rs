use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::dsl::{ParamType, Parameter, Parameters};
use crate::error::BindingError;

/// Root under which the caller inputs are addressable (`{{inputs.x}}`).
pub const INPUTS_KEY: &str = "inputs";

/// Dotted-path view of a scope: `a`, `a.b`, `a.items.0.name` all resolve.
pub type FlatScope = HashMap<String, Value>;

/// What happens when a `{{path}}` does not resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingPolicy {
    /// Unresolved references fail the node with a `BindingError`.
    #[default]
    Strict,
    /// Unresolved references become `null` (empty text when rendering).
    Lenient,
}

impl BindingPolicy {
    fn miss(self, path: &str) -> Result<Value, BindingError> {
        match self {
            BindingPolicy::Strict => Err(BindingError::Unresolved(path.to_string())),
            BindingPolicy::Lenient => {
                debug!(path, "unresolved binding resolved to null");
                Ok(Value::Null)
            }
        }
    }
}

/// 运行时作用域: caller inputs plus one result per executed node.
///
/// Only the executor writes to it, and each node ID at most once. The
/// dotted-path view is maintained on insert, so taking a snapshot only
/// clones two handles.
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    raw: Arc<Map<String, Value>>,
    flat: Arc<FlatScope>,
}

impl Scope {
    pub fn new(inputs: Map<String, Value>) -> Self {
        let mut raw = Map::new();
        raw.insert(INPUTS_KEY.to_string(), Value::Object(inputs));
        let flat = flatten(&raw);
        Self {
            raw: Arc::new(raw),
            flat: Arc::new(flat),
        }
    }

    /// Records a node result. Returns false if the node already has one.
    pub fn insert(&mut self, node_id: &str, value: Value) -> bool {
        if node_id == INPUTS_KEY || self.raw.contains_key(node_id) {
            return false;
        }
        flatten_into(node_id.to_string(), &value, Arc::make_mut(&mut self.flat));
        Arc::make_mut(&mut self.raw).insert(node_id.to_string(), value);
        true
    }

    pub fn get(&self, node_id: &str) -> Option<&Value> {
        if node_id == INPUTS_KEY {
            return None;
        }
        self.raw.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.get(node_id).is_some()
    }

    /// Number of node results (caller inputs excluded).
    pub fn len(&self) -> usize {
        self.raw.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// IDs of the nodes with a recorded result, sorted.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str).filter(|id| *id != INPUTS_KEY)
    }

    /// Shares the current state with the nodes of one level. Writes made
    /// while a snapshot is alive copy the scope first.
    pub fn snapshot(&self) -> ScopeSnapshot {
        ScopeSnapshot {
            raw: Arc::clone(&self.raw),
            flat: Arc::clone(&self.flat),
        }
    }
}

/// Immutable view of the scope shared by every node of one level.
///
/// `raw` is unflattened: `{"inputs": {...}, "<node id>": <result>, ...}`.
#[derive(Debug, Clone, Default)]
pub struct ScopeSnapshot {
    raw: Arc<Map<String, Value>>,
    flat: Arc<FlatScope>,
}

impl ScopeSnapshot {
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn flat(&self) -> &FlatScope {
        &self.flat
    }

    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.flat.get(path)
    }
}

pub fn flatten(map: &Map<String, Value>) -> FlatScope {
    let mut out = HashMap::new();
    for (key, value) in map {
        flatten_into(key.clone(), value, &mut out);
    }
    out
}

fn flatten_into(path: String, value: &Value, out: &mut FlatScope) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(format!("{}.{}", path, key), child, out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                flatten_into(format!("{}.{}", path, i), child, out);
            }
        }
        _ => {}
    }
    out.insert(path, value.clone());
}

/// Returns the path of a value that is exactly one `{{path}}` template.
pub fn template_path(raw: &str) -> Option<&str> {
    let inner = raw.trim().strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

pub fn resolve_parameter(
    param: &Parameter,
    flat: &FlatScope,
    policy: BindingPolicy,
) -> Result<Value, BindingError> {
    if let Some(path) = template_path(&param.value) {
        return match flat.get(path) {
            Some(value) => Ok(value.clone()),
            None => policy.miss(path),
        };
    }
    if param.value.contains("{{") {
        return render(&param.value, flat, policy).map(Value::String);
    }
    coerce_literal(&param.value, param.kind)
}

/// Resolves declared inputs; a node without declared inputs sees the raw scope.
pub fn resolve_inputs(
    params: &Parameters,
    snapshot: &ScopeSnapshot,
    policy: BindingPolicy,
) -> Result<Map<String, Value>, BindingError> {
    if params.is_empty() {
        return Ok(snapshot.raw().clone());
    }
    let mut inputs = Map::with_capacity(params.len());
    for (name, param) in params {
        inputs.insert(name.clone(), resolve_parameter(param, snapshot.flat(), policy)?);
    }
    Ok(inputs)
}

/// Interpolates every `{{path}}` occurrence inside `template`.
pub fn render(template: &str, flat: &FlatScope, policy: BindingPolicy) -> Result<String, BindingError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let path = after[..end].trim();
        match flat.get(path) {
            Some(Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_string()),
            None => {
                policy.miss(path)?;
            }
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn coerce_literal(raw: &str, kind: ParamType) -> Result<Value, BindingError> {
    let invalid = || BindingError::InvalidLiteral {
        value: raw.to_string(),
        expected: kind,
    };
    let trimmed = raw.trim();

    match kind {
        ParamType::String => Ok(Value::String(raw.to_string())),
        ParamType::Number => trimmed
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid),
        ParamType::Integer => trimmed.parse::<i64>().map(Value::from).map_err(|_| invalid()),
        ParamType::Boolean => match trimmed {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        ParamType::Json => serde_json::from_str(trimmed).map_err(|_| invalid()),
        ParamType::Any => Ok(serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(raw.to_string()))),
    }
}
