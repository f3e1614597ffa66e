use crate::constants::auth::TOKEN_TTL_SECS;
use crate::constants::network::TIMEOUT_TOKEN_FETCH_MS;
use crate::errors::ExecutionError;
use crate::model::{DynamicAuthConfig, PayloadEncoding, PayloadLocation, Provider, TokenRequestMethod};
use crate::services::egress::EgressGuard;
use crate::services::logger::Logger;
use crate::services::request::map_reqwest_error;
use crate::services::security::Security;
use crate::utils::data_path::get_path_value;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Per-provider cache of short-lived bearer tokens. Tokens live for a fixed
/// window from fetch time; concurrent cache misses for one provider collapse
/// onto a single upstream fetch.
pub struct DynamicTokenManager {
    logger: Logger,
    security: Arc<Security>,
    egress: Arc<EgressGuard>,
    client: reqwest::Client,
    cache: Mutex<HashMap<i64, CachedToken>>,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl DynamicTokenManager {
    pub fn new(logger: Logger, security: Arc<Security>, egress: Arc<EgressGuard>) -> Self {
        Self {
            logger,
            security,
            egress,
            client: reqwest::Client::new(),
            cache: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// `None` means the provider does not use dynamic auth.
    pub async fn token_for(&self, provider: &Provider) -> Result<Option<String>, ExecutionError> {
        let Some(auth) = provider.dynamic_auth.as_ref().filter(|auth| auth.enabled) else {
            return Ok(None);
        };
        if let Some(token) = self.cached(provider.id) {
            return Ok(Some(token));
        }
        let lock = self.provider_lock(provider.id);
        let _guard = lock.lock().await;
        // Another caller may have fetched while this one waited.
        if let Some(token) = self.cached(provider.id) {
            return Ok(Some(token));
        }
        let token = self.fetch_token(provider, auth).await?;
        self.store(provider.id, &token);
        self.logger.debug(
            "Fetched dynamic token",
            Some(&serde_json::json!({"provider": provider.code})),
        );
        Ok(Some(token))
    }

    /// Evicts unconditionally; never errors.
    pub fn invalidate(&self, provider_id: i64) {
        if let Ok(mut guard) = self.cache.lock() {
            guard.remove(&provider_id);
        }
        if let Ok(mut locks) = self.locks.lock() {
            // A strong count above one means a fetch still holds the lock.
            let idle = locks
                .get(&provider_id)
                .map_or(false, |lock| Arc::strong_count(lock) == 1);
            if idle {
                locks.remove(&provider_id);
            }
        }
        self.logger.debug(
            "Invalidated dynamic token",
            Some(&serde_json::json!({"provider_id": provider_id})),
        );
    }

    fn cached(&self, provider_id: i64) -> Option<String> {
        let guard = self.cache.lock().ok()?;
        let entry = guard.get(&provider_id)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        Some(entry.token.clone())
    }

    fn store(&self, provider_id: i64, token: &str) {
        if let Ok(mut guard) = self.cache.lock() {
            guard.insert(
                provider_id,
                CachedToken {
                    token: token.to_string(),
                    expires_at: Instant::now() + Duration::from_secs(TOKEN_TTL_SECS),
                },
            );
        }
    }

    fn provider_lock(&self, provider_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.locks.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .entry(provider_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn fetch_token(
        &self,
        provider: &Provider,
        auth: &DynamicAuthConfig,
    ) -> Result<String, ExecutionError> {
        let token_url = Url::parse(auth.token_url.as_str()).map_err(|_| {
            ExecutionError::invalid_argument(format!(
                "Token URL '{}' is not a valid URL",
                auth.token_url
            ))
        })?;
        // The token endpoint is an outbound call like any other.
        self.egress.check(&token_url).await?;

        let mut payload: Vec<(String, String)> = Vec::with_capacity(auth.payload.len());
        for (key, value) in auth.payload.iter() {
            payload.push((key.clone(), self.security.decrypt_if_encrypted(value)?));
        }

        let method = match auth.method {
            TokenRequestMethod::Get => reqwest::Method::GET,
            TokenRequestMethod::Post => reqwest::Method::POST,
        };
        let mut request = self
            .client
            .request(method, token_url)
            .timeout(Duration::from_millis(TIMEOUT_TOKEN_FETCH_MS));

        match auth.payload_location {
            PayloadLocation::Body => {
                request = match auth.payload_encoding {
                    PayloadEncoding::Json => {
                        let mut map = serde_json::Map::new();
                        for (key, value) in &payload {
                            map.insert(key.clone(), Value::String(value.clone()));
                        }
                        request.json(&map)
                    }
                    PayloadEncoding::FormData => request.form(&payload),
                };
            }
            PayloadLocation::Headers => {
                for (key, value) in &payload {
                    request = request.header(key.as_str(), value.as_str());
                }
            }
            PayloadLocation::QueryParameters => {
                request = request.query(&payload);
            }
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ExecutionError::auth_expired(format!(
                "Token endpoint '{}' rejected the request with status {}",
                auth.token_url,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ExecutionError::failed(format!(
                "Token endpoint '{}' returned status {}",
                auth.token_url,
                status.as_u16()
            )));
        }

        let path = auth.token_path.trim();
        if path.is_empty() {
            let token = body.trim().to_string();
            if token.is_empty() {
                return Err(ExecutionError::failed(format!(
                    "Token endpoint '{}' returned an empty body",
                    auth.token_url
                )));
            }
            return Ok(token);
        }

        let parsed: Value = serde_json::from_str(&body).map_err(|_| {
            ExecutionError::failed(format!(
                "Token endpoint '{}' returned a non-JSON response",
                auth.token_url
            ))
        })?;
        let value = get_path_value(&parsed, path).map_err(|_| {
            ExecutionError::failed(format!("Token path '{}' not found in response", path))
        })?;
        match value {
            Value::String(token) => Ok(token),
            other => Ok(other.to_string()),
        }
    }
}
