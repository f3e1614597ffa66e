use crate::errors::ExecutionError;
use crate::services::audit::AuditSink;
use crate::services::egress::EgressGuard;
use crate::services::executor::Dispatcher;
use crate::services::logger::Logger;
use crate::services::memory::MemoryService;
use crate::services::native::{self, NativeToolRouter};
use crate::services::registry::ToolRegistry;
use crate::services::security::Security;
use crate::services::token::DynamicTokenManager;
use crate::stores::{InMemoryLogStore, InMemoryToolStore, ToolStore};
use std::path::Path;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub registry: Arc<ToolRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub native: Arc<NativeToolRouter>,
    pub audit: Arc<AuditSink>,
    pub log_store: Arc<InMemoryLogStore>,
}

impl App {
    /// Must run inside a tokio runtime; the audit sink spawns its flush task
    /// on construction.
    pub fn initialize() -> Result<Self, ExecutionError> {
        let logger = Logger::new("toolgate");
        let security = Arc::new(Security::new()?);

        let tool_store: Arc<dyn ToolStore> = match std::env::var("TOOLGATE_TOOLS_FILE") {
            Ok(path) if !path.trim().is_empty() => {
                Arc::new(InMemoryToolStore::load(Path::new(path.trim()))?)
            }
            _ => Arc::new(InMemoryToolStore::new()),
        };
        let log_store = Arc::new(InMemoryLogStore::new());

        let audit = Arc::new(AuditSink::new(logger.child("audit"), log_store.clone()));
        let registry = Arc::new(ToolRegistry::new(logger.child("registry"), tool_store));
        let egress = Arc::new(EgressGuard::from_env(logger.child("egress")));
        let tokens = Arc::new(DynamicTokenManager::new(
            logger.child("token"),
            security.clone(),
            egress.clone(),
        ));
        let memory = Arc::new(MemoryService::new());
        let native = Arc::new(native::memory_router(memory));

        let dispatcher = Arc::new(Dispatcher::new(
            logger.child("executor"),
            registry.clone(),
            tokens,
            security,
            egress,
            native.clone(),
            audit.clone(),
        )?);

        Ok(Self {
            logger,
            registry,
            dispatcher,
            native,
            audit,
            log_store,
        })
    }
}
