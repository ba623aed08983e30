use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::info;

use crate::tools::Tool;

/// Logs `msg` (or all arguments) and echoes it back as the result.
#[derive(Debug)]
pub struct LogTool;

#[async_trait]
impl Tool for LogTool {
    fn name(&self) -> &str {
        "log"
    }

    fn description(&self) -> &str {
        "Write a message to the engine log"
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<String> {
        match args.get("msg") {
            Some(Value::String(msg)) => {
                info!("[LOG] {}", msg);
                Ok(msg.clone())
            }
            _ => {
                let rendered = Value::Object(args).to_string();
                info!("[LOG] {}", rendered);
                Ok(rendered)
            }
        }
    }
}
