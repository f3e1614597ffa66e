use crate::constants::native::NAMESPACE_PREFIX;
use crate::errors::ExecutionError;
use crate::services::memory::MemoryService;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait NativeHandler: Send + Sync {
    async fn handle(&self, code: &str, args: &Map<String, Value>)
        -> Result<Value, ExecutionError>;
}

#[derive(Debug, Clone)]
pub struct NativeToolDefinition {
    pub code: String,
    pub description: String,
    pub input_schema: Value,
}

/// Explicit router for the reserved native namespace. Codes under the
/// prefix never reach the outbound HTTP pipeline, even when a remote tool
/// shares the name.
#[derive(Default)]
pub struct NativeToolRouter {
    handlers: HashMap<String, Arc<dyn NativeHandler>>,
    definitions: Vec<NativeToolDefinition>,
}

impl NativeToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: NativeToolDefinition, handler: Arc<dyn NativeHandler>) {
        self.handlers.insert(definition.code.clone(), handler);
        self.definitions.push(definition);
    }

    pub fn owns(&self, code: &str) -> bool {
        code.starts_with(NAMESPACE_PREFIX)
    }

    pub async fn dispatch(
        &self,
        code: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ExecutionError> {
        match self.handlers.get(code) {
            Some(handler) => handler.handle(code, args).await,
            None => Err(ExecutionError::not_found(format!("Tool not found: {}", code))),
        }
    }

    pub fn definitions(&self) -> &[NativeToolDefinition] {
        &self.definitions
    }
}

fn require_str<'a>(args: &'a Map<String, Value>, key: &str) -> Result<&'a str, ExecutionError> {
    args.get(key)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ExecutionError::invalid_argument(format!("Missing required argument: {}", key))
        })
}

fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn to_value<T: serde::Serialize>(payload: T) -> Result<Value, ExecutionError> {
    serde_json::to_value(payload).map_err(|err| ExecutionError::internal(err.to_string()))
}

struct MemoryHandler {
    memory: Arc<MemoryService>,
}

#[async_trait]
impl NativeHandler for MemoryHandler {
    async fn handle(
        &self,
        code: &str,
        args: &Map<String, Value>,
    ) -> Result<Value, ExecutionError> {
        match code {
            "memory_save_intent" => {
                let description = require_str(args, "description")?;
                to_value(self.memory.save_intent(description))
            }
            "memory_list_intents" => {
                let status = optional_str(args, "status");
                to_value(self.memory.list_intents(status))
            }
            "memory_complete_intent" => {
                let id = require_str(args, "id")?;
                to_value(self.memory.complete_intent(id)?)
            }
            "memory_save_knowledge" => {
                let topic = require_str(args, "topic")?;
                let content = require_str(args, "content")?;
                to_value(self.memory.save_knowledge(topic, content))
            }
            "memory_search_knowledge" => {
                let query = require_str(args, "query")?;
                to_value(self.memory.search_knowledge(query))
            }
            "memory_create_task" => {
                let title = require_str(args, "title")?;
                to_value(self.memory.create_task(title))
            }
            "memory_list_tasks" => {
                let status = optional_str(args, "status");
                to_value(self.memory.list_tasks(status))
            }
            "memory_update_task" => {
                let id = require_str(args, "id")?;
                let status = require_str(args, "status")?;
                to_value(self.memory.update_task(id, status)?)
            }
            other => Err(ExecutionError::not_found(format!("Tool not found: {}", other))),
        }
    }
}

fn string_schema(required: &[(&str, &str)], optional: &[(&str, &str)]) -> Value {
    let mut properties = serde_json::Map::new();
    for (name, description) in required.iter().chain(optional.iter()) {
        properties.insert(
            name.to_string(),
            serde_json::json!({"type": "string", "description": description}),
        );
    }
    let required: Vec<&str> = required.iter().map(|(name, _)| *name).collect();
    serde_json::json!({"type": "object", "properties": properties, "required": required})
}

pub fn memory_router(memory: Arc<MemoryService>) -> NativeToolRouter {
    let handler: Arc<dyn NativeHandler> = Arc::new(MemoryHandler { memory });
    let mut router = NativeToolRouter::new();
    let tools: Vec<(&str, &str, Value)> = vec![
        (
            "memory_save_intent",
            "Record an intent the agent is pursuing",
            string_schema(&[("description", "What the agent intends to do")], &[]),
        ),
        (
            "memory_list_intents",
            "List recorded intents, optionally filtered by status",
            string_schema(&[], &[("status", "active or completed")]),
        ),
        (
            "memory_complete_intent",
            "Mark a recorded intent as completed",
            string_schema(&[("id", "Intent id")], &[]),
        ),
        (
            "memory_save_knowledge",
            "Store a piece of knowledge under a topic",
            string_schema(
                &[
                    ("topic", "Topic the knowledge belongs to"),
                    ("content", "The knowledge itself"),
                ],
                &[],
            ),
        ),
        (
            "memory_search_knowledge",
            "Search stored knowledge by substring",
            string_schema(&[("query", "Case-insensitive search text")], &[]),
        ),
        (
            "memory_create_task",
            "Create a task on the agent task list",
            string_schema(&[("title", "Task title")], &[]),
        ),
        (
            "memory_list_tasks",
            "List tasks, optionally filtered by status",
            string_schema(&[], &[("status", "pending, in_progress or completed")]),
        ),
        (
            "memory_update_task",
            "Update the status of a task",
            string_schema(
                &[
                    ("id", "Task id"),
                    ("status", "pending, in_progress or completed"),
                ],
                &[],
            ),
        ),
    ];
    for (code, description, input_schema) in tools {
        router.register(
            NativeToolDefinition {
                code: code.to_string(),
                description: description.to_string(),
                input_schema,
            },
            handler.clone(),
        );
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> NativeToolRouter {
        memory_router(Arc::new(MemoryService::new()))
    }

    #[tokio::test]
    async fn namespace_is_reserved_even_for_unknown_codes() {
        let router = router();
        assert!(router.owns("memory_something_else"));
        let err = router
            .dispatch("memory_something_else", &Map::new())
            .await
            .expect_err("must be not found");
        assert!(err.message.contains("memory_something_else"));
    }

    #[tokio::test]
    async fn missing_required_argument_is_invalid() {
        let router = router();
        let err = router
            .dispatch("memory_save_intent", &Map::new())
            .await
            .expect_err("must fail");
        assert!(err.message.contains("description"));
    }

    #[tokio::test]
    async fn save_and_list_round_trip() {
        let router = router();
        let mut args = Map::new();
        args.insert(
            "description".to_string(),
            Value::String("review PR".to_string()),
        );
        let saved = router
            .dispatch("memory_save_intent", &args)
            .await
            .expect("must save");
        assert_eq!(saved["status"], "active");
        let listed = router
            .dispatch("memory_list_intents", &Map::new())
            .await
            .expect("must list");
        assert_eq!(listed.as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn registers_all_memory_tools() {
        assert_eq!(router().definitions().len(), 8);
    }
}
