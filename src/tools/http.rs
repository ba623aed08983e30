use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value, json};

use crate::tools::Tool;

/// Performs an HTTP request from `url`, `method`, `headers` and `body`.
///
/// The result is `{ "status": <u16>, "data": <json body or text> }`.
#[derive(Debug, Default)]
pub struct HttpTool {
    client: Client,
}

impl HttpTool {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        "http"
    }

    fn description(&self) -> &str {
        "Send an HTTP request and return its status and body"
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<String> {
        let url = args
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("Missing required parameter: url"))?;

        let method_str = args.get("method").and_then(|v| v.as_str()).unwrap_or("GET");
        let method = method_str
            .to_uppercase()
            .parse::<reqwest::Method>()
            .map_err(|_| anyhow!("Invalid HTTP method: {}", method_str))?;

        let mut builder = self.client.request(method, url);

        if let Some(body) = args.get("body").filter(|b| !b.is_null()) {
            builder = builder.json(body);
        }

        if let Some(headers) = args.get("headers").and_then(|v| v.as_object()) {
            for (k, v) in headers {
                if let Some(v_str) = v.as_str() {
                    builder = builder.header(k, v_str);
                }
            }
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let data = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "status": status,
            "data": data
        })
        .to_string())
    }
}
