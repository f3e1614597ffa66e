use crate::errors::ExecutionError;
use crate::model::Tool;
use crate::services::logger::Logger;
use crate::stores::ToolStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory view of callable tools keyed by code. Reads only ever see
/// enabled and healthy tools; a cache miss falls back to the backing store.
pub struct ToolRegistry {
    logger: Logger,
    store: Arc<dyn ToolStore>,
    tools: Mutex<HashMap<String, Arc<Tool>>>,
}

impl ToolRegistry {
    pub fn new(logger: Logger, store: Arc<dyn ToolStore>) -> Self {
        Self {
            logger,
            store,
            tools: Mutex::new(HashMap::new()),
        }
    }

    /// Rebuilds the whole map from the store, then swaps it in under the
    /// lock. Concurrent readers observe either the old or the new map,
    /// never a partial one.
    pub async fn refresh(&self) -> Result<usize, ExecutionError> {
        let loaded = self.store.find_all_enabled().await?;
        let mut next = HashMap::new();
        for tool in loaded {
            if tool.callable() {
                next.insert(tool.code.clone(), Arc::new(tool));
            }
        }
        let count = next.len();
        let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        *guard = next;
        drop(guard);
        self.logger.info(
            "Tool registry refreshed",
            Some(&serde_json::json!({"tools": count})),
        );
        Ok(count)
    }

    pub fn all(&self) -> Vec<Arc<Tool>> {
        let guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        let mut tools: Vec<Arc<Tool>> = guard.values().cloned().collect();
        tools.sort_by(|a, b| a.code.cmp(&b.code));
        tools
    }

    /// Returns the tool even when it is disabled or unhealthy so the caller
    /// can refuse it explicitly; only callable tools are cached.
    pub async fn get(&self, code: &str) -> Option<Arc<Tool>> {
        {
            let guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
            if let Some(tool) = guard.get(code) {
                return Some(tool.clone());
            }
        }
        match self.store.find_tool_by_code(code).await {
            Ok(Some(tool)) => {
                let tool = Arc::new(tool);
                if tool.callable() {
                    let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
                    guard.insert(tool.code.clone(), tool.clone());
                }
                Some(tool)
            }
            Ok(None) => None,
            Err(err) => {
                self.logger.warn(
                    "Tool store lookup failed",
                    Some(&serde_json::json!({"tool": code, "error": err.to_string()})),
                );
                None
            }
        }
    }

    pub fn upsert(&self, tool: Tool) {
        let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        if tool.callable() {
            guard.insert(tool.code.clone(), Arc::new(tool));
        } else {
            guard.remove(&tool.code);
        }
    }

    pub fn remove(&self, code: &str) -> bool {
        let mut guard = self.tools.lock().unwrap_or_else(|err| err.into_inner());
        guard.remove(code).is_some()
    }
}
