use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::llm::Provider;
use crate::tools::Tool;
use crate::tools::builtin::LogTool;
use crate::tools::http::HttpTool;

/// Collaborators available to `llm` and `tool` nodes.
#[derive(Default)]
pub struct Registry {
    providers: DashMap<String, Arc<dyn Provider>>,
    tools: DashMap<(String, String), Arc<dyn Tool>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the `log` and `http` tools.
    pub fn with_builtin_tools() -> Self {
        let registry = Self::new();
        registry.register_tool(Arc::new(LogTool));
        registry.register_tool(Arc::new(HttpTool::new()));
        registry
    }

    pub fn register_provider(&self, provider: Arc<dyn Provider>) {
        debug!(provider = provider.name(), "registered llm provider");
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        debug!(kind = tool.kind(), tool = tool.name(), "registered tool");
        let key = (tool.kind().to_string(), tool.name().to_string());
        self.tools.insert(key, tool);
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).map(|p| p.value().clone())
    }

    pub fn tool(&self, kind: &str, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .get(&(kind.to_string(), name.to_string()))
            .map(|t| t.value().clone())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        let tools: Vec<String> = self
            .tools
            .iter()
            .map(|e| format!("{}/{}", e.key().0, e.key().1))
            .collect();
        f.debug_struct("Registry")
            .field("providers", &providers)
            .field("tools", &tools)
            .finish()
    }
}
