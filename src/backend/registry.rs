// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::tool::Tool;
use crate::flow::suggest::nearest_match;

/// Shared tool registry. Nodes declare tool names in the workflow document
/// and the executor resolves them here at run time.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Nearest registered name for an unknown tool, for error messages.
    pub async fn suggest(&self, name: &str) -> Option<String> {
        let tools = self.tools.read().await;
        nearest_match(name, tools.keys().map(String::as_str))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
