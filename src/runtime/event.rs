use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    NodeStarted,
    NodeFinished,
    NodeSkipped,
    /// Incremental payload from a streaming llm or tool node.
    Chunk,
    /// One bound value of an end node.
    Output,
    /// The complete outputs map of an end node.
    End,
}

/// 中间结果事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data: Value,
    #[serde(rename = "type")]
    pub kind: EventType,
}

impl Event {
    pub fn new(name: impl Into<String>, data: Value, kind: EventType) -> Self {
        Self {
            name: name.into(),
            data,
            kind,
        }
    }
}

/// Publishing half of a run's event stream. A disabled sink drops events, so
/// runs without a consumer never block on publication.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<Event>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub async fn emit(&self, event: Event) {
        if let Some(tx) = &self.tx {
            if tx.send(event).await.is_err() {
                trace!("event receiver dropped");
            }
        }
    }
}
