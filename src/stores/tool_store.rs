use crate::errors::ExecutionError;
use crate::model::Tool;
use crate::stores::ToolStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

/// Process-local tool store. Serves as the default backing store (seeded
/// from a JSON definitions file) and as the test fixture.
#[derive(Default)]
pub struct InMemoryToolStore {
    tools: Mutex<HashMap<String, Tool>>,
}

impl InMemoryToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON array of tool definitions.
    pub fn load(path: &Path) -> Result<Self, ExecutionError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ExecutionError::internal(format!(
                "Failed to read tool definitions from {}: {}",
                path.display(),
                err
            ))
        })?;
        let tools: Vec<Tool> = serde_json::from_str(&raw).map_err(|err| {
            ExecutionError::invalid_argument(format!("Invalid tool definitions file: {}", err))
        })?;
        let store = Self::new();
        for tool in tools {
            store.insert(tool);
        }
        Ok(store)
    }

    pub fn insert(&self, tool: Tool) {
        let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        guard.insert(tool.code.clone(), tool);
    }

    pub fn remove(&self, code: &str) -> bool {
        let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        guard.remove(code).is_some()
    }
}

#[async_trait]
impl ToolStore for InMemoryToolStore {
    async fn find_tool_by_code(&self, code: &str) -> Result<Option<Tool>, ExecutionError> {
        let guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        Ok(guard.get(code).cloned())
    }

    async fn find_all_enabled(&self) -> Result<Vec<Tool>, ExecutionError> {
        let guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        Ok(guard.values().filter(|tool| tool.enabled).cloned().collect())
    }
}
