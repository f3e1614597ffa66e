use crate::constants::network::TIMEOUT_OUTBOUND_MS;
use crate::constants::tool_types;
use crate::errors::ExecutionError;
use crate::model::{AuthType, ExecuteResponse, ExecutionRecord, Provider};
use crate::services::audit::AuditSink;
use crate::services::egress::EgressGuard;
use crate::services::logger::Logger;
use crate::services::native::NativeToolRouter;
use crate::services::registry::ToolRegistry;
use crate::services::request::{self, Credential, RequestPlan};
use crate::services::security::Security;
use crate::services::token::DynamicTokenManager;
use crate::utils::obfuscate::obfuscate_capped;
use crate::utils::text::truncate_utf8_prefix;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Uniform entry point for tool calls. Native-namespace codes go to the
/// in-process router; everything else runs the outbound HTTP pipeline with
/// credential resolution, egress validation and a single auth retry.
pub struct Dispatcher {
    logger: Logger,
    registry: Arc<ToolRegistry>,
    tokens: Arc<DynamicTokenManager>,
    security: Arc<Security>,
    egress: Arc<EgressGuard>,
    native: Arc<NativeToolRouter>,
    audit: Arc<AuditSink>,
    client: reqwest::Client,
}

impl Dispatcher {
    pub fn new(
        logger: Logger,
        registry: Arc<ToolRegistry>,
        tokens: Arc<DynamicTokenManager>,
        security: Arc<Security>,
        egress: Arc<EgressGuard>,
        native: Arc<NativeToolRouter>,
        audit: Arc<AuditSink>,
    ) -> Result<Self, ExecutionError> {
        // Redirects stay disabled so every outbound URL is the one the
        // egress guard approved.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| {
                ExecutionError::internal(format!("Failed to build HTTP client: {}", err))
            })?;
        Ok(Self {
            logger,
            registry,
            tokens,
            security,
            egress,
            native,
            audit,
            client,
        })
    }

    /// Every invocation, successful or not, produces an audit record.
    /// Failures come back in-band; this method does not error.
    pub async fn execute(
        &self,
        tool_code: &str,
        arguments: Map<String, Value>,
        session_id: Option<String>,
    ) -> ExecuteResponse {
        let started = Instant::now();
        let (tool_type, outcome) = if self.native.owns(tool_code) {
            (
                tool_types::SYSTEM,
                self.native.dispatch(tool_code, &arguments).await,
            )
        } else {
            (tool_types::API, self.execute_api(tool_code, &arguments).await)
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let (success, result, error) = match outcome {
            Ok(value) => (true, Some(value), None),
            Err(err) => {
                self.logger.warn(
                    "Tool execution failed",
                    Some(&serde_json::json!({
                        "tool": tool_code,
                        "code": err.code,
                        "message": err.message.clone(),
                    })),
                );
                (false, None, Some(err.message))
            }
        };

        let record = ExecutionRecord {
            tool_code: tool_code.to_string(),
            tool_type: tool_type.to_string(),
            session_id,
            request_payload: obfuscate_capped(&Value::Object(arguments).to_string()),
            response_payload: match (&result, &error) {
                (Some(value), _) => obfuscate_capped(&value.to_string()),
                (None, Some(message)) => obfuscate_capped(message),
                _ => String::new(),
            },
            success,
            error_message: error.clone(),
            duration_ms,
            executed_at: chrono::Utc::now(),
        };
        self.audit.enqueue(record);

        ExecuteResponse {
            success,
            result,
            duration_ms,
            tool_type: tool_type.to_string(),
            error,
        }
    }

    async fn execute_api(
        &self,
        code: &str,
        arguments: &Map<String, Value>,
    ) -> Result<Value, ExecutionError> {
        let tool = self
            .registry
            .get(code)
            .await
            .ok_or_else(|| ExecutionError::not_found(format!("Tool not found: {}", code)))?;
        if !tool.callable() {
            return Err(ExecutionError::refused(format!(
                "Tool is disabled or unhealthy: {}",
                code
            )));
        }

        let provider = &tool.provider;
        let dynamic = provider.dynamic_auth_enabled();
        let keywords = provider
            .dynamic_auth
            .as_ref()
            .map(|auth| auth.keyword_list())
            .unwrap_or_default();

        let credential = self.resolve_credential(provider).await?;
        let plan = request::build_plan(&tool, arguments, &credential)?;
        self.egress.check(&plan.url).await?;
        let (status, body) = self.send(&plan).await?;

        let token_rejected = dynamic
            && (status == reqwest::StatusCode::UNAUTHORIZED
                || matches_keyword(&keywords, &body));
        if token_rejected {
            // One refresh, one resend. A second rejection is terminal.
            self.tokens.invalidate(provider.id);
            self.logger.warn(
                "Dynamic token rejected, retrying once",
                Some(&serde_json::json!({"tool": tool.code, "status": status.as_u16()})),
            );
            let credential = self.resolve_credential(provider).await?;
            let plan = request::build_plan(&tool, arguments, &credential)?;
            let (status, body) = self.send(&plan).await?;
            if !status.is_success() {
                return Err(ExecutionError::failed(format!(
                    "Tool call failed after token refresh with status {}",
                    status.as_u16()
                )));
            }
            if matches_keyword(&keywords, &body) {
                return Err(ExecutionError::failed(
                    "Tool response matched an invalidation keyword after token refresh",
                ));
            }
            return Ok(parse_body(body));
        }

        if !status.is_success() {
            return Err(ExecutionError::failed(format!(
                "Tool call failed with status {}",
                status.as_u16()
            ))
            .with_details(serde_json::json!({
                "body": truncate_utf8_prefix(&body, 512),
            })));
        }
        Ok(parse_body(body))
    }

    async fn resolve_credential(&self, provider: &Provider) -> Result<Credential, ExecutionError> {
        if let Some(token) = self.tokens.token_for(provider).await? {
            return Ok(request::bearer_credential(&token));
        }
        if provider.auth_type == AuthType::None {
            return Ok(Credential::None);
        }
        let raw = provider.credential_value.as_deref().unwrap_or("");
        if raw.is_empty() {
            return Err(ExecutionError::invalid_argument(format!(
                "Provider '{}' has no credential configured",
                provider.code
            )));
        }
        let secret = self.security.decrypt_if_encrypted(raw)?;
        Ok(request::place_credential(
            provider.auth_type,
            provider.credential_location,
            provider.credential_name.as_deref(),
            &secret,
        ))
    }

    async fn send(
        &self,
        plan: &RequestPlan,
    ) -> Result<(reqwest::StatusCode, String), ExecutionError> {
        let mut builder = self
            .client
            .request(plan.method.as_reqwest(), plan.url.clone())
            .timeout(Duration::from_millis(TIMEOUT_OUTBOUND_MS));
        for (name, value) in &plan.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &plan.body {
            builder = builder.json(body);
        }
        let response = builder.send().await.map_err(request::map_reqwest_error)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(request::map_reqwest_error)?;
        Ok((status, body))
    }
}

fn matches_keyword(keywords: &[String], body: &str) -> bool {
    if keywords.is_empty() {
        return false;
    }
    let lowered = body.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

fn parse_body(body: String) -> Value {
    match serde_json::from_str::<Value>(&body) {
        Ok(value) => value,
        Err(_) => Value::String(body),
    }
}
