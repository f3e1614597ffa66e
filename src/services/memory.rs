use crate::errors::ExecutionError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

pub const INTENT_ACTIVE: &str = "active";
pub const INTENT_COMPLETED: &str = "completed";
pub const TASK_STATUSES: &[&str] = &["pending", "in_progress", "completed"];

#[derive(Debug, Clone, Serialize)]
pub struct Intent {
    pub id: String,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeEntry {
    pub id: String,
    pub topic: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskEntry {
    pub id: String,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Process-local bookkeeping behind the native `memory_` tools: intents an
/// agent is pursuing, knowledge it wants to keep, and its task list.
#[derive(Default)]
pub struct MemoryService {
    intents: Mutex<Vec<Intent>>,
    knowledge: Mutex<Vec<KnowledgeEntry>>,
    tasks: Mutex<Vec<TaskEntry>>,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_intent(&self, description: &str) -> Intent {
        let intent = Intent {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.to_string(),
            status: INTENT_ACTIVE.to_string(),
            created_at: Utc::now(),
            completed_at: None,
        };
        let mut guard = self.intents.lock().unwrap_or_else(|err| err.into_inner());
        guard.push(intent.clone());
        intent
    }

    pub fn list_intents(&self, status: Option<&str>) -> Vec<Intent> {
        let guard = self.intents.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .iter()
            .filter(|intent| status.map(|s| intent.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn complete_intent(&self, id: &str) -> Result<Intent, ExecutionError> {
        let mut guard = self.intents.lock().unwrap_or_else(|err| err.into_inner());
        let intent = guard
            .iter_mut()
            .find(|intent| intent.id == id)
            .ok_or_else(|| ExecutionError::not_found(format!("Intent not found: {}", id)))?;
        intent.status = INTENT_COMPLETED.to_string();
        intent.completed_at = Some(Utc::now());
        Ok(intent.clone())
    }

    pub fn save_knowledge(&self, topic: &str, content: &str) -> KnowledgeEntry {
        let entry = KnowledgeEntry {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let mut guard = self.knowledge.lock().unwrap_or_else(|err| err.into_inner());
        guard.push(entry.clone());
        entry
    }

    pub fn search_knowledge(&self, query: &str) -> Vec<KnowledgeEntry> {
        let needle = query.to_lowercase();
        let guard = self.knowledge.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .iter()
            .filter(|entry| {
                entry.topic.to_lowercase().contains(&needle)
                    || entry.content.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn create_task(&self, title: &str) -> TaskEntry {
        let now = Utc::now();
        let task = TaskEntry {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            status: TASK_STATUSES[0].to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut guard = self.tasks.lock().unwrap_or_else(|err| err.into_inner());
        guard.push(task.clone());
        task
    }

    pub fn list_tasks(&self, status: Option<&str>) -> Vec<TaskEntry> {
        let guard = self.tasks.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .iter()
            .filter(|task| status.map(|s| task.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn update_task(&self, id: &str, status: &str) -> Result<TaskEntry, ExecutionError> {
        if !TASK_STATUSES.contains(&status) {
            return Err(ExecutionError::invalid_argument(format!(
                "Invalid task status '{}'; expected one of {}",
                status,
                TASK_STATUSES.join(", ")
            )));
        }
        let mut guard = self.tasks.lock().unwrap_or_else(|err| err.into_inner());
        let task = guard
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| ExecutionError::not_found(format!("Task not found: {}", id)))?;
        task.status = status.to_string();
        task.updated_at = Utc::now();
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExecutionErrorKind;

    #[test]
    fn intent_lifecycle() {
        let memory = MemoryService::new();
        let intent = memory.save_intent("ship the release");
        assert_eq!(memory.list_intents(Some(INTENT_ACTIVE)).len(), 1);
        let completed = memory.complete_intent(&intent.id).expect("must complete");
        assert_eq!(completed.status, INTENT_COMPLETED);
        assert!(memory.list_intents(Some(INTENT_ACTIVE)).is_empty());
    }

    #[test]
    fn knowledge_search_is_case_insensitive() {
        let memory = MemoryService::new();
        memory.save_knowledge("Deploys", "Use the blue pipeline");
        assert_eq!(memory.search_knowledge("BLUE").len(), 1);
        assert!(memory.search_knowledge("green").is_empty());
    }

    #[test]
    fn task_status_is_validated() {
        let memory = MemoryService::new();
        let task = memory.create_task("write docs");
        let err = memory
            .update_task(&task.id, "paused")
            .expect_err("must reject");
        assert_eq!(err.kind, ExecutionErrorKind::InvalidArgument);
        let updated = memory
            .update_task(&task.id, "in_progress")
            .expect("must update");
        assert_eq!(updated.status, "in_progress");
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let memory = MemoryService::new();
        assert_eq!(
            memory.complete_intent("missing").expect_err("err").kind,
            ExecutionErrorKind::NotFound
        );
    }
}
