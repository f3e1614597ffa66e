use crate::errors::ExecutionError;
use crate::model::ExecutionRecord;
use crate::stores::ExecutionLogStore;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Process-local execution log. `set_failing` lets tests exercise the audit
/// sink's behavior when persistence is down.
#[derive(Default)]
pub struct InMemoryLogStore {
    records: Mutex<Vec<ExecutionRecord>>,
    failing: AtomicBool,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExecutionRecord> {
        let guard = self.records.lock().unwrap_or_else(|err| err.into_inner());
        guard.clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExecutionLogStore for InMemoryLogStore {
    async fn save_batch(&self, records: Vec<ExecutionRecord>) -> Result<(), ExecutionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExecutionError::internal("Execution log store unavailable"));
        }
        let mut guard = self.records.lock().unwrap_or_else(|err| err.into_inner());
        guard.extend(records);
        Ok(())
    }
}
