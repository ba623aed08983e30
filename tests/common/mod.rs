#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};

use flowdag::llm::{Chunk, Completion, InvokeRequest, Provider, Response, Usage};
use flowdag::tools::Tool;

pub fn inputs(value: Value) -> HashMap<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        _ => panic!("inputs must be a JSON object"),
    }
}

/// Records the arguments of every call and answers with a fixed reply.
#[derive(Debug)]
pub struct RecordingTool {
    name: String,
    reply: String,
    calls: Mutex<Vec<Map<String, Value>>>,
}

impl RecordingTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Map<String, Value>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<String> {
        self.calls.lock().unwrap().push(args);
        Ok(self.reply.clone())
    }
}

/// Sleeps, tracking how many invocations overlap.
#[derive(Debug)]
pub struct SleepTool {
    name: String,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SleepTool {
    pub fn new(name: &str, delay_ms: u64) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::from_millis(delay_ms),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, _args: Map<String, Value>) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok("\"slept\"".to_string())
    }
}

#[derive(Debug)]
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        "explode"
    }

    async fn invoke(&self, _args: Map<String, Value>) -> Result<String> {
        Err(anyhow!("boom"))
    }
}

/// Streams numbered items through the streaming entry point.
#[derive(Debug)]
pub struct CountingTool;

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "count"
    }

    async fn invoke(&self, _args: Map<String, Value>) -> Result<String> {
        Ok("[1,2,3]".to_string())
    }

    fn supports_stream(&self) -> bool {
        true
    }

    async fn stream(&self, _args: Map<String, Value>) -> Result<BoxStream<'static, Value>> {
        Ok(stream::iter((1..=3).map(Value::from)).boxed())
    }
}

/// Answers every request with a fixed script, streamed or not depending on
/// the request.
#[derive(Debug)]
pub struct ScriptedProvider {
    pieces: Vec<String>,
    requests: Mutex<Vec<InvokeRequest>>,
}

impl ScriptedProvider {
    pub fn new(pieces: &[&str]) -> Self {
        Self {
            pieces: pieces.iter().map(|p| p.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InvokeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, request: InvokeRequest) -> Result<Response> {
        let model = request.model.clone();
        let streaming = request.stream;
        self.requests.lock().unwrap().push(request);

        let usage = Usage {
            input_tokens: 10,
            output_tokens: self.pieces.len() as u64,
        };
        if !streaming {
            return Ok(Response::Complete(Completion {
                model,
                content: self.pieces.concat(),
                usage,
            }));
        }

        let mut chunks: Vec<Result<Chunk>> = self.pieces.iter().cloned().map(|p| Ok(Chunk::Text(p))).collect();
        chunks.push(Ok(Chunk::Usage(usage)));
        Ok(Response::Stream {
            model,
            chunks: stream::iter(chunks).boxed(),
        })
    }
}

#[derive(Debug)]
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn invoke(&self, _request: InvokeRequest) -> Result<Response> {
        Err(anyhow!("service unavailable"))
    }
}
