use crate::constants::auth::{DEFAULT_API_KEY_HEADER, DEFAULT_CREDENTIAL_PARAM};
use crate::errors::ExecutionError;
use crate::model::{AuthType, CredentialLocation, HttpMethod, Tool};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_\-]+)\}").expect("placeholder regex"));

/// A resolved credential and where it travels. Produced by a pure function
/// over the provider configuration, so rebuilding a request after a token
/// refresh is just re-running the builder with a new credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    Header { name: String, value: String },
    Query { name: String, value: String },
    Body { name: String, value: String },
}

#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

pub fn bearer_credential(token: &str) -> Credential {
    Credential::Header {
        name: "Authorization".to_string(),
        value: format!("Bearer {}", token),
    }
}

pub fn place_credential(
    auth_type: AuthType,
    location: CredentialLocation,
    name: Option<&str>,
    value: &str,
) -> Credential {
    let named = |fallback: &str| {
        name.map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    match location {
        CredentialLocation::Header => {
            let (header_name, header_value) = match auth_type {
                AuthType::BearerToken => {
                    ("Authorization".to_string(), format!("Bearer {}", value))
                }
                AuthType::BasicAuth => ("Authorization".to_string(), format!("Basic {}", value)),
                _ => (named(DEFAULT_API_KEY_HEADER), value.to_string()),
            };
            Credential::Header {
                name: header_name,
                value: header_value,
            }
        }
        CredentialLocation::QueryParameter => Credential::Query {
            name: named(DEFAULT_CREDENTIAL_PARAM),
            value: value.to_string(),
        },
        CredentialLocation::InBody => Credential::Body {
            name: named(DEFAULT_CREDENTIAL_PARAM),
            value: value.to_string(),
        },
    }
}

/// Builds the outbound request plan for a tool call. `{name}` placeholders
/// in the endpoint path consume their matching argument; unmatched
/// placeholders stay literal. Leftover arguments go to the query string for
/// GET/DELETE and to the JSON body otherwise.
pub fn build_plan(
    tool: &Tool,
    arguments: &Map<String, Value>,
    credential: &Credential,
) -> Result<RequestPlan, ExecutionError> {
    let mut remaining = arguments.clone();
    let path = substitute_placeholders(&tool.endpoint_path, &mut remaining);
    let joined = join_url(&tool.provider.base_url, &path);
    let mut url = Url::parse(&joined).map_err(|_| {
        ExecutionError::invalid_argument(format!("Invalid request URL: {}", joined))
    })?;

    let mut headers: Vec<(String, String)> = Vec::new();
    let mut body: Option<Map<String, Value>> = None;

    if tool.method.query_args() {
        for (key, value) in remaining.iter() {
            url.query_pairs_mut().append_pair(key, &render_scalar(value));
        }
    } else if !remaining.is_empty() {
        body = Some(remaining);
    }

    match credential {
        Credential::None => {}
        Credential::Header { name, value } => headers.push((name.clone(), value.clone())),
        Credential::Query { name, value } => {
            url.query_pairs_mut().append_pair(name, value);
        }
        Credential::Body { name, value } => {
            // Overwrites any caller-supplied field of the same name.
            body.get_or_insert_with(Map::new)
                .insert(name.clone(), Value::String(value.clone()));
        }
    }

    for (name, value) in tool.provider.custom_headers.iter() {
        headers.push((name.clone(), value.clone()));
    }

    Ok(RequestPlan {
        method: tool.method,
        url,
        headers,
        body: body.map(Value::Object),
    })
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ExecutionError {
    if err.is_timeout() {
        return ExecutionError::timeout("HTTP request timed out");
    }
    ExecutionError::failed(err.to_string())
}

fn substitute_placeholders(path: &str, args: &mut Map<String, Value>) -> String {
    PLACEHOLDER_RE
        .replace_all(path, |caps: &regex::Captures| match args.remove(&caps[1]) {
            Some(value) => render_scalar(&value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Provider;
    use std::collections::HashMap;

    fn provider() -> Provider {
        Provider {
            id: 1,
            code: "acme".to_string(),
            name: "Acme".to_string(),
            base_url: "https://api.acme.test/v1".to_string(),
            auth_type: AuthType::None,
            credential_location: CredentialLocation::Header,
            credential_name: None,
            credential_value: None,
            custom_headers: HashMap::new(),
            dynamic_auth: None,
        }
    }

    fn tool(endpoint_path: &str, method: HttpMethod) -> Tool {
        Tool {
            id: 1,
            code: "acme_lookup".to_string(),
            name: "Acme lookup".to_string(),
            description: String::new(),
            provider: provider(),
            endpoint_path: endpoint_path.to_string(),
            method,
            enabled: true,
            healthy: true,
            last_health_check: None,
            parameters: Vec::new(),
        }
    }

    fn args(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn substituted_placeholders_leave_the_argument_set() {
        let tool = tool("/users/{id}/orders", HttpMethod::Get);
        let arguments = args(&[("id", Value::String("42".into())), ("limit", Value::from(5))]);
        let plan = build_plan(&tool, &arguments, &Credential::None).expect("must build");
        assert_eq!(plan.url.path(), "/v1/users/42/orders");
        assert_eq!(plan.url.query(), Some("limit=5"));
    }

    #[test]
    fn unmatched_placeholders_stay_literal() {
        let tool = tool("/users/{id}", HttpMethod::Get);
        let plan = build_plan(&tool, &Map::new(), &Credential::None).expect("must build");
        assert!(plan.url.path().contains("%7Bid%7D") || plan.url.as_str().contains("{id}"));
    }

    #[test]
    fn post_arguments_become_json_body() {
        let tool = tool("/orders", HttpMethod::Post);
        let arguments = args(&[("sku", Value::String("A-1".into())), ("qty", Value::from(2))]);
        let plan = build_plan(&tool, &arguments, &Credential::None).expect("must build");
        assert!(plan.url.query().is_none());
        let body = plan.body.expect("body expected");
        assert_eq!(body["sku"], "A-1");
        assert_eq!(body["qty"], 2);
    }

    #[test]
    fn body_credential_overwrites_caller_input() {
        let tool = tool("/orders", HttpMethod::Post);
        let arguments = args(&[("api_key", Value::String("caller-lie".into()))]);
        let credential = Credential::Body {
            name: "api_key".to_string(),
            value: "real".to_string(),
        };
        let plan = build_plan(&tool, &arguments, &credential).expect("must build");
        assert_eq!(plan.body.expect("body expected")["api_key"], "real");
    }

    #[test]
    fn query_credential_lands_in_query_string_for_post() {
        let tool = tool("/orders", HttpMethod::Post);
        let credential = Credential::Query {
            name: "api_key".to_string(),
            value: "k".to_string(),
        };
        let plan = build_plan(&tool, &Map::new(), &credential).expect("must build");
        assert_eq!(plan.url.query(), Some("api_key=k"));
        assert!(plan.body.is_none());
    }

    #[test]
    fn custom_headers_are_added_verbatim() {
        let mut tool = tool("/ping", HttpMethod::Get);
        tool.provider
            .custom_headers
            .insert("X-Tenant".to_string(), "blue".to_string());
        let plan = build_plan(&tool, &Map::new(), &Credential::None).expect("must build");
        assert!(plan
            .headers
            .iter()
            .any(|(name, value)| name == "X-Tenant" && value == "blue"));
    }

    #[test]
    fn bearer_and_basic_take_the_authorization_header() {
        let bearer = place_credential(
            AuthType::BearerToken,
            CredentialLocation::Header,
            None,
            "tok",
        );
        assert_eq!(
            bearer,
            Credential::Header {
                name: "Authorization".to_string(),
                value: "Bearer tok".to_string()
            }
        );
        let basic = place_credential(AuthType::BasicAuth, CredentialLocation::Header, None, "enc");
        assert_eq!(
            basic,
            Credential::Header {
                name: "Authorization".to_string(),
                value: "Basic enc".to_string()
            }
        );
    }

    #[test]
    fn api_key_header_defaults_its_name() {
        let credential =
            place_credential(AuthType::ApiKey, CredentialLocation::Header, None, "k");
        assert_eq!(
            credential,
            Credential::Header {
                name: "X-API-Key".to_string(),
                value: "k".to_string()
            }
        );
    }
}
