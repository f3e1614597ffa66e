use crate::constants::audit::{FLUSH_INTERVAL_MS, QUEUE_CAPACITY};
use crate::model::ExecutionRecord;
use crate::services::logger::Logger;
use crate::stores::ExecutionLogStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

/// Asynchronous audit pipeline: executions enqueue records onto a bounded
/// channel and a background task persists them in batches. A full queue
/// drops the newest record with a warning; persistence failures are logged
/// and never reach the execution path.
pub struct AuditSink {
    logger: Logger,
    sender: Mutex<Option<mpsc::Sender<ExecutionRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditSink {
    pub fn new(logger: Logger, store: Arc<dyn ExecutionLogStore>) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ExecutionRecord>(QUEUE_CAPACITY);
        let worker_logger = logger.clone();
        let worker = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(FLUSH_INTERVAL_MS));
            let mut pending: Vec<ExecutionRecord> = Vec::new();
            loop {
                tokio::select! {
                    received = receiver.recv() => match received {
                        Some(record) => pending.push(record),
                        None => break,
                    },
                    _ = interval.tick() => {
                        flush(&worker_logger, store.as_ref(), &mut pending).await;
                    }
                }
            }
            flush(&worker_logger, store.as_ref(), &mut pending).await;
        });
        Self {
            logger,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Best-effort; the caller's result is never affected.
    pub fn enqueue(&self, record: ExecutionRecord) {
        let guard = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = guard.as_ref() else {
            return;
        };
        match sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                self.logger.warn(
                    "Audit queue full, dropping record",
                    Some(&serde_json::json!({"tool": record.tool_code})),
                );
            }
            Err(TrySendError::Closed(_)) => {
                self.logger.warn("Audit queue closed, dropping record", None);
            }
        }
    }

    /// Closes the queue and waits for the remaining records to be persisted.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None);
        drop(sender);
        let worker = self
            .worker
            .lock()
            .map(|mut guard| guard.take())
            .unwrap_or(None);
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

async fn flush(logger: &Logger, store: &dyn ExecutionLogStore, pending: &mut Vec<ExecutionRecord>) {
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    let count = batch.len();
    if let Err(err) = store.save_batch(batch).await {
        logger.error(
            "Failed to persist execution log batch",
            Some(&serde_json::json!({"records": count, "error": err.to_string()})),
        );
    } else {
        logger.debug(
            "Persisted execution log batch",
            Some(&serde_json::json!({"records": count})),
        );
    }
}
