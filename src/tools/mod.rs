use std::fmt::Debug;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

pub mod builtin;
pub mod http;

/// Registry kind of the tools shipped with this crate.
pub const BUILTIN_KIND: &str = "builtin";

/// 插件接口：tool 节点调用的外部能力
///
/// Tools are resolved by `(kind, name)` and receive the node's resolved inputs.
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn kind(&self) -> &str {
        BUILTIN_KIND
    }

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<String>;

    fn supports_stream(&self) -> bool {
        false
    }

    async fn stream(&self, _args: Map<String, Value>) -> Result<BoxStream<'static, Value>> {
        Err(anyhow!("tool {} does not support streaming", self.name()))
    }
}
