use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dsl::Node;
use crate::error::{DefinitionError, NodeError};
use crate::llm::{Chunk, Completion, InvokeRequest, Message, Response};
use crate::nodes::{meta_bool, meta_number, meta_string};
use crate::runtime::context::ExecRequest;
use crate::runtime::event::EventType;
use crate::runtime::node::Outcome;
use crate::runtime::scope::{flatten, render};

/// LLM 节点配置
#[derive(Debug, Clone, PartialEq)]
pub struct LlmNode {
    provider: String,
    model: String,
    system_prompt: Option<String>,
    user_prompt: String,
    stream: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl LlmNode {
    pub fn prepare(node: &Node) -> Result<Self, DefinitionError> {
        let provider = meta_string(node, "provider")?
            .filter(|p| !p.trim().is_empty())
            .ok_or(DefinitionError::MissingMetadata("provider"))?;
        let max_tokens = match meta_number(node, "max_tokens")? {
            Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Some(n as u32),
            Some(n) => {
                return Err(DefinitionError::InvalidMetadata {
                    field: "max_tokens",
                    reason: format!("expected a positive integer, found {}", n),
                });
            }
            None => None,
        };

        Ok(Self {
            provider,
            model: meta_string(node, "model")?.unwrap_or_default(),
            system_prompt: meta_string(node, "system_prompt")?.filter(|s| !s.is_empty()),
            user_prompt: meta_string(node, "user_prompt")?.unwrap_or_default(),
            stream: meta_bool(node, "stream")?.unwrap_or(true),
            temperature: meta_number(node, "temperature")?.map(|t| t as f32),
            max_tokens,
        })
    }

    pub async fn execute(&self, req: &ExecRequest) -> Result<Outcome, NodeError> {
        let flat = flatten(&req.inputs);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(render(system, &flat, req.policy)?));
        }
        messages.push(Message::user(render(&self.user_prompt, &flat, req.policy)?));

        let provider = req
            .registry
            .provider(&self.provider)
            .ok_or_else(|| NodeError::ProviderNotFound(self.provider.clone()))?;

        let request = InvokeRequest {
            model: self.model.clone(),
            messages,
            stream: self.stream,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..Default::default()
        };

        debug!(node_id = %req.node_id, provider = %self.provider, model = %self.model, stream = self.stream, "invoking llm");
        let response = provider.invoke(request).await.map_err(NodeError::Provider)?;
        let completion = self.consume(req, response).await?;

        Ok(Outcome::Value(json!({
            "message": { "content": strip_code_fence(&completion.content) },
            "model": completion.model,
            "usage": completion.usage,
        })))
    }

    /// Drains a response, publishing each streamed text piece as a chunk event.
    async fn consume(&self, req: &ExecRequest, response: Response) -> Result<Completion, NodeError> {
        let (model, mut chunks) = match response {
            Response::Complete(completion) => return Ok(completion),
            Response::Stream { model, chunks } => (model, chunks),
        };

        let mut completion = Completion {
            model,
            ..Default::default()
        };
        while let Some(chunk) = chunks.next().await {
            match chunk.map_err(NodeError::Provider)? {
                Chunk::Text(text) => {
                    req.emit(Value::String(text.clone()), EventType::Chunk).await;
                    completion.content.push_str(&text);
                }
                Chunk::Usage(usage) => completion.usage = usage,
            }
        }

        if completion.content.is_empty() {
            warn!(node_id = %req.node_id, provider = %self.provider, "llm stream produced no text");
        }
        Ok(completion)
    }
}

/// Removes one leading ```` ```lang ```` line and one trailing ```` ``` ````.
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
