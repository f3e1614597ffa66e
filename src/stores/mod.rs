mod log_store;
mod tool_store;

pub use log_store::InMemoryLogStore;
pub use tool_store::InMemoryToolStore;

use crate::errors::ExecutionError;
use crate::model::{ExecutionRecord, Tool};
use async_trait::async_trait;

/// Persistent source of tool definitions. The registry treats it as the
/// fallback behind its in-memory cache.
#[async_trait]
pub trait ToolStore: Send + Sync {
    async fn find_tool_by_code(&self, code: &str) -> Result<Option<Tool>, ExecutionError>;
    async fn find_all_enabled(&self) -> Result<Vec<Tool>, ExecutionError>;
}

#[async_trait]
pub trait ExecutionLogStore: Send + Sync {
    async fn save_batch(&self, records: Vec<ExecutionRecord>) -> Result<(), ExecutionError>;
}
