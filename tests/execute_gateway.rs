mod common;

use common::{api_key_provider, args, dynamic_provider, gateway, provider, tool};
use serde_json::json;
use std::sync::Arc;
use toolgate::model::HttpMethod;
use toolgate::stores::{InMemoryLogStore, InMemoryToolStore};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn executes_get_tool_with_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/current"))
        .and(header("X-API-Key", "plain-secret"))
        .and(query_param("city", "Oslo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"temp_c": 11})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "weather_lookup",
        api_key_provider(&server.uri(), "X-API-Key", "plain-secret"),
        "/v1/current",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));
    gw.registry.refresh().await.expect("refresh");

    let response = gw
        .dispatcher
        .execute(
            "weather_lookup",
            args(&[("city", json!("Oslo"))]),
            Some("session-1".to_string()),
        )
        .await;

    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(response.result, Some(json!({"temp_c": 11})));
    assert_eq!(response.tool_type, "api_tool");
    assert!(response.error.is_none());
}

#[tokio::test]
async fn substitutes_path_placeholders_and_keeps_leftovers_in_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/42/orders"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "order_list",
        provider(&server.uri()),
        "/users/{user_id}/orders",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw
        .dispatcher
        .execute(
            "order_list",
            args(&[("user_id", json!("42")), ("limit", json!(5))]),
            None,
        )
        .await;
    assert!(response.success, "error: {:?}", response.error);
}

#[tokio::test]
async fn post_sends_remaining_arguments_as_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_json(json!({"qty": 2, "sku": "A-1"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "order_create",
        provider(&server.uri()),
        "/orders",
        HttpMethod::Post,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw
        .dispatcher
        .execute(
            "order_create",
            args(&[("sku", json!("A-1")), ("qty", json!(2))]),
            None,
        )
        .await;
    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(response.result, Some(json!({"id": 9})));
}

#[tokio::test]
async fn unknown_tool_fails_in_band() {
    let gw = gateway(
        Arc::new(InMemoryToolStore::new()),
        Arc::new(InMemoryLogStore::new()),
    );
    let response = gw.dispatcher.execute("nope", args(&[]), None).await;
    assert!(!response.success);
    assert!(response
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Tool not found: nope"));
}

#[tokio::test]
async fn unknown_tool_still_lands_in_the_audit_trail() {
    let log_store = Arc::new(InMemoryLogStore::new());
    let gw = gateway(Arc::new(InMemoryToolStore::new()), log_store.clone());

    let response = gw
        .dispatcher
        .execute("nope", args(&[]), Some("session-3".to_string()))
        .await;
    assert!(!response.success);

    gw.audit.shutdown().await;
    let records = log_store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.tool_code, "nope");
    assert_eq!(record.session_id.as_deref(), Some("session-3"));
    assert!(!record.success);
    assert!(record
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("Tool not found: nope"));
}

#[tokio::test]
async fn disabled_tool_is_refused_before_any_io() {
    let store = Arc::new(InMemoryToolStore::new());
    let mut disabled = tool(
        "broken_tool",
        provider("http://127.0.0.1:9"),
        "/x",
        HttpMethod::Get,
    );
    disabled.healthy = false;
    store.insert(disabled);
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw.dispatcher.execute("broken_tool", args(&[]), None).await;
    assert!(!response.success);
    assert!(response
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("disabled or unhealthy"));
}

#[tokio::test]
async fn registry_refresh_filters_disabled_and_unhealthy() {
    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool("alive", provider("http://x.test"), "/a", HttpMethod::Get));
    let mut off = tool("off", provider("http://x.test"), "/b", HttpMethod::Get);
    off.enabled = false;
    store.insert(off);
    let mut sick = tool("sick", provider("http://x.test"), "/c", HttpMethod::Get);
    sick.healthy = false;
    store.insert(sick);

    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));
    let count = gw.registry.refresh().await.expect("refresh");
    assert_eq!(count, 1);
    let codes: Vec<String> = gw.registry.all().iter().map(|t| t.code.clone()).collect();
    assert_eq!(codes, vec!["alive"]);
}

#[tokio::test]
async fn retries_once_with_a_fresh_token_after_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let token_url = format!("{}/token", server.uri());
    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "data_fetch",
        dynamic_provider(&server.uri(), &token_url, "access_token"),
        "/data",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw.dispatcher.execute("data_fetch", args(&[]), None).await;
    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(response.result, Some(json!({"ok": true})));
}

#[tokio::test]
async fn second_unauthorized_is_terminal_with_status_in_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let token_url = format!("{}/token", server.uri());
    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "data_fetch",
        dynamic_provider(&server.uri(), &token_url, "access_token"),
        "/data",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw.dispatcher.execute("data_fetch", args(&[]), None).await;
    assert!(!response.success);
    assert!(response
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("401"));
}

#[tokio::test]
async fn invalidation_keyword_in_2xx_body_triggers_the_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-1"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok-2"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "invalid_token"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": 3})))
        .expect(1)
        .mount(&server)
        .await;

    let token_url = format!("{}/token", server.uri());
    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "data_fetch",
        dynamic_provider(&server.uri(), &token_url, "access_token"),
        "/data",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw.dispatcher.execute("data_fetch", args(&[]), None).await;
    assert!(response.success, "error: {:?}", response.error);
    assert_eq!(response.result, Some(json!({"value": 3})));
}

#[tokio::test]
async fn metadata_endpoint_is_rejected_before_sending() {
    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "sneaky",
        provider("http://169.254.169.254"),
        "/latest/meta-data",
        HttpMethod::Get,
    ));
    let gw = gateway(store, Arc::new(InMemoryLogStore::new()));

    let response = gw.dispatcher.execute("sneaky", args(&[]), None).await;
    assert!(!response.success);
    assert!(response
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("169.254.169.254"));
}

#[tokio::test]
async fn native_memory_tools_bypass_the_http_pipeline() {
    let gw = gateway(
        Arc::new(InMemoryToolStore::new()),
        Arc::new(InMemoryLogStore::new()),
    );

    let saved = gw
        .dispatcher
        .execute(
            "memory_save_intent",
            args(&[("description", json!("ship it"))]),
            None,
        )
        .await;
    assert!(saved.success, "error: {:?}", saved.error);
    assert_eq!(saved.tool_type, "system_tool");

    let listed = gw
        .dispatcher
        .execute("memory_list_intents", args(&[]), None)
        .await;
    assert!(listed.success);
    assert_eq!(
        listed.result.and_then(|v| v.as_array().map(|a| a.len())),
        Some(1)
    );

    let missing = gw
        .dispatcher
        .execute("memory_save_intent", args(&[]), None)
        .await;
    assert!(!missing.success);
    assert!(missing
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Missing required argument"));
}

#[tokio::test]
async fn audit_records_are_obfuscated_and_flushed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryToolStore::new());
    store.insert(tool(
        "order_create",
        provider(&server.uri()),
        "/orders",
        HttpMethod::Post,
    ));
    let log_store = Arc::new(InMemoryLogStore::new());
    let gw = gateway(store, log_store.clone());

    let response = gw
        .dispatcher
        .execute(
            "order_create",
            args(&[("sku", json!("A-1")), ("api_token", json!("secret-val"))]),
            Some("session-9".to_string()),
        )
        .await;
    assert!(response.success, "error: {:?}", response.error);

    gw.audit.shutdown().await;
    let records = log_store.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.tool_code, "order_create");
    assert_eq!(record.session_id.as_deref(), Some("session-9"));
    assert!(record.success);
    assert!(record.request_payload.contains("******"));
    assert!(!record.request_payload.contains("secret-val"));
    assert!(record.request_payload.contains("A-1"));
}
