#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use toolgate::model::{
    AuthType, CredentialLocation, DynamicAuthConfig, HttpMethod, PayloadEncoding, PayloadLocation,
    Provider, Tool, TokenRequestMethod,
};
use toolgate::services::audit::AuditSink;
use toolgate::services::egress::EgressGuard;
use toolgate::services::executor::Dispatcher;
use toolgate::services::logger::Logger;
use toolgate::services::memory::MemoryService;
use toolgate::services::native;
use toolgate::services::registry::ToolRegistry;
use toolgate::services::security::Security;
use toolgate::services::token::DynamicTokenManager;
use toolgate::stores::{InMemoryLogStore, InMemoryToolStore, ToolStore};

pub const TEST_KEY: [u8; 32] = [7u8; 32];

pub fn provider(base_url: &str) -> Provider {
    Provider {
        id: 1,
        code: "acme".to_string(),
        name: "Acme".to_string(),
        base_url: base_url.to_string(),
        auth_type: AuthType::None,
        credential_location: CredentialLocation::Header,
        credential_name: None,
        credential_value: None,
        custom_headers: HashMap::new(),
        dynamic_auth: None,
    }
}

pub fn api_key_provider(base_url: &str, header_name: &str, value: &str) -> Provider {
    let mut provider = provider(base_url);
    provider.auth_type = AuthType::ApiKey;
    provider.credential_location = CredentialLocation::Header;
    provider.credential_name = Some(header_name.to_string());
    provider.credential_value = Some(value.to_string());
    provider
}

pub fn dynamic_provider(base_url: &str, token_url: &str, token_path: &str) -> Provider {
    let mut provider = provider(base_url);
    provider.dynamic_auth = Some(DynamicAuthConfig {
        enabled: true,
        token_url: token_url.to_string(),
        method: TokenRequestMethod::Post,
        payload: HashMap::from([("client_id".to_string(), "gateway".to_string())]),
        payload_location: PayloadLocation::Body,
        payload_encoding: PayloadEncoding::Json,
        token_path: token_path.to_string(),
        invalidation_keywords: "invalid_token".to_string(),
    });
    provider
}

pub fn tool(code: &str, provider: Provider, endpoint_path: &str, method: HttpMethod) -> Tool {
    Tool {
        id: 1,
        code: code.to_string(),
        name: code.to_string(),
        description: format!("{} test tool", code),
        provider,
        endpoint_path: endpoint_path.to_string(),
        method,
        enabled: true,
        healthy: true,
        last_health_check: None,
        parameters: Vec::new(),
    }
}

pub struct Gateway {
    pub dispatcher: Arc<Dispatcher>,
    pub registry: Arc<ToolRegistry>,
    pub audit: Arc<AuditSink>,
}

pub fn gateway(tool_store: Arc<InMemoryToolStore>, log_store: Arc<InMemoryLogStore>) -> Gateway {
    let logger = Logger::new("test");
    let security = Arc::new(Security::from_key(&TEST_KEY).expect("test key"));
    let store: Arc<dyn ToolStore> = tool_store;
    let registry = Arc::new(ToolRegistry::new(logger.child("registry"), store));
    // Mock servers bind to loopback, so private egress stays allowed here.
    let egress = Arc::new(EgressGuard::new(logger.child("egress"), true));
    let tokens = Arc::new(DynamicTokenManager::new(
        logger.child("token"),
        security.clone(),
        egress.clone(),
    ));
    let native = Arc::new(native::memory_router(Arc::new(MemoryService::new())));
    let audit = Arc::new(AuditSink::new(logger.child("audit"), log_store));
    let dispatcher = Arc::new(
        Dispatcher::new(
            logger.child("executor"),
            registry.clone(),
            tokens,
            security,
            egress,
            native,
            audit.clone(),
        )
        .expect("dispatcher"),
    );
    Gateway {
        dispatcher,
        registry,
        audit,
    }
}

pub fn args(pairs: &[(&str, serde_json::Value)]) -> serde_json::Map<String, serde_json::Value> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}
