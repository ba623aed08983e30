//! LLM provider contract consumed by `llm` nodes.
//!
//! Concrete clients live outside this crate; they implement [`Provider`] and
//! are registered on the [`Registry`](crate::runtime::registry::Registry).

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Tool description offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub model: String,
    pub content: String,
    pub usage: Usage,
}

/// One increment of a streaming response.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Text(String),
    Usage(Usage),
}

#[derive(Debug, Clone, Default)]
pub struct InvokeRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    /// Ask for a `Response::Stream` instead of a blocking completion.
    pub stream: bool,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

pub enum Response {
    Complete(Completion),
    Stream {
        model: String,
        chunks: BoxStream<'static, Result<Chunk>>,
    },
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Complete(completion) => f.debug_tuple("Complete").field(completion).finish(),
            Response::Stream { model, .. } => f.debug_struct("Stream").field("model", model).finish_non_exhaustive(),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    async fn invoke(&self, request: InvokeRequest) -> Result<Response>;
}
