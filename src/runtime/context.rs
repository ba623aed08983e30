use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::runtime::event::{Event, EventSink, EventType};
use crate::runtime::registry::Registry;
use crate::runtime::scope::{BindingPolicy, ScopeSnapshot};

/// 运行时上下文 handed to a single node execution.
///
/// Cheap to build: the snapshot, registry and sink are shared handles.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub run_id: Uuid,
    pub node_id: String,
    /// Resolved declared inputs, or the raw scope when none are declared.
    pub inputs: Map<String, Value>,
    pub scope: Arc<ScopeSnapshot>,
    pub events: EventSink,
    pub registry: Arc<Registry>,
    pub policy: BindingPolicy,
}

impl ExecRequest {
    pub async fn emit(&self, data: Value, kind: EventType) {
        self.events.emit(Event::new(self.node_id.clone(), data, kind)).await;
    }
}
