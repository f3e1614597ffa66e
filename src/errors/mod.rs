mod execution_error;
mod mcp_error;

pub use execution_error::{ExecutionError, ExecutionErrorKind};
pub use mcp_error::{ErrorCode, McpError};
