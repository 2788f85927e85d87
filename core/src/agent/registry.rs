use crate::traits::{Tool, ToolError, ToolResult, ToolSpec};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

pub struct ToolRegistry {
    tools: Mutex<Vec<Arc<dyn Tool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Mutex::new(Vec::new()),
        }
    }

    fn tools(&self) -> MutexGuard<'_, Vec<Arc<dyn Tool>>> {
        self.tools.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a tool, replacing any earlier tool with the same name in place.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools();
        match tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => tools[idx] = tool,
            None => tools.push(tool),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.tools().iter().map(|t| t.name().to_string()).collect()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools().iter().map(|t| t.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools().is_empty()
    }

    pub async fn invoke(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self.tools().iter().find(|t| t.name() == name).cloned();

        match tool {
            Some(tool) => {
                debug!(tool = name, %args, "executing tool");
                tool.execute(args).await
            }
            None => Err(ToolError::NotFound(name.to_string())),
        }
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        match self.invoke(name, args).await {
            Ok(output) => ToolResult::success(output),
            Err(e) => {
                warn!(tool = name, "tool call failed: {}", e);
                ToolResult::error(e.to_string())
            }
        }
    }
}
