use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthType {
    None,
    ApiKey,
    BearerToken,
    BasicAuth,
}

impl Default for AuthType {
    fn default() -> Self {
        AuthType::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialLocation {
    Header,
    QueryParameter,
    InBody,
}

impl Default for CredentialLocation {
    fn default() -> Self {
        CredentialLocation::Header
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }

    /// Methods whose leftover arguments travel in the query string
    /// rather than a JSON body.
    pub fn query_args(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenRequestMethod {
    Get,
    Post,
}

impl Default for TokenRequestMethod {
    fn default() -> Self {
        TokenRequestMethod::Post
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadLocation {
    Body,
    Headers,
    QueryParameters,
}

impl Default for PayloadLocation {
    fn default() -> Self {
        PayloadLocation::Body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayloadEncoding {
    Json,
    FormData,
}

impl Default for PayloadEncoding {
    fn default() -> Self {
        PayloadEncoding::Json
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParameterKind {
    pub fn json_type(self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Array => "array",
            ParameterKind::Object => "object",
        }
    }
}

/// Token endpoint configuration for providers that hand out short-lived
/// bearer tokens. Payload values are stored encrypted and decrypted just
/// before the token request is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    pub token_url: String,
    #[serde(default)]
    pub method: TokenRequestMethod,
    #[serde(default)]
    pub payload: HashMap<String, String>,
    #[serde(default)]
    pub payload_location: PayloadLocation,
    #[serde(default)]
    pub payload_encoding: PayloadEncoding,
    /// Dot path into the token response; empty means the raw body is the token.
    #[serde(default)]
    pub token_path: String,
    /// Comma-separated markers whose presence in a response body means the
    /// current token is no longer accepted.
    #[serde(default)]
    pub invalidation_keywords: String,
}

impl DynamicAuthConfig {
    pub fn keyword_list(&self) -> Vec<String> {
        self.invalidation_keywords
            .split(',')
            .map(|keyword| keyword.trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub credential_location: CredentialLocation,
    #[serde(default)]
    pub credential_name: Option<String>,
    /// Encrypted at rest; decrypted only at the point of use.
    #[serde(default)]
    pub credential_value: Option<String>,
    #[serde(default)]
    pub custom_headers: HashMap<String, String>,
    #[serde(default)]
    pub dynamic_auth: Option<DynamicAuthConfig>,
}

impl Provider {
    pub fn dynamic_auth_enabled(&self) -> bool {
        self.dynamic_auth
            .as_ref()
            .map(|auth| auth.enabled)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParameterKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub provider: Provider,
    /// May contain `{param}` placeholders filled from call arguments.
    pub endpoint_path: String,
    pub method: HttpMethod,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub healthy: bool,
    #[serde(default)]
    pub last_health_check: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

fn default_true() -> bool {
    true
}

impl Tool {
    pub fn callable(&self) -> bool {
        self.enabled && self.healthy
    }
}

/// One immutable line of audit history. Payloads are obfuscated and capped
/// before the record is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_code: String,
    pub tool_type: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub request_payload: String,
    pub response_payload: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub duration_ms: u64,
    pub tool_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
