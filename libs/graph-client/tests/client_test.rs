use std::time::Duration;

use graph_client::transport::app_secret_proof;
use graph_client::{
    BackoffPolicy, CallContext, GraphClient, GraphClientConfig, GraphError, MinimalResponse,
    StatusCode,
};
use httpmock::prelude::*;
use serde_json::{Value, json};

fn fast_retries() -> BackoffPolicy {
    BackoffPolicy::requests()
        .with_initial_interval(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(20))
        .with_max_elapsed_time(Duration::from_millis(200))
}

fn create_client(server: &MockServer) -> GraphClient {
    let config = GraphClientConfig::new("test-token", "test-secret")
        .with_base_url(server.base_url())
        .with_retry_policy(fast_retries())
        .with_upload_retry_policy(fast_retries());
    GraphClient::from_config(config).unwrap()
}

#[tokio::test]
async fn test_requests_are_signed() {
    let server = MockServer::start();
    let proof = app_secret_proof("test-secret", "test-token").unwrap();

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v19.0/me")
            .query_param("fields", "id,name")
            .query_param("access_token", "test-token")
            .query_param("appsecret_proof", proof.as_str());
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"id": "1", "name": "Page"}));
    });

    let client = create_client(&server);
    let url = client
        .route("v19.0", "/me")
        .fields(&["id", "name"])
        .build()
        .unwrap();
    let me: Value = client.get_json(&CallContext::new(), &url).await.unwrap();

    assert_eq!(me["name"], json!("Page"));
    mock.assert();
}

#[tokio::test]
async fn test_page_access_token_override() {
    let server = MockServer::start();
    let proof = app_secret_proof("test-secret", "page-token").unwrap();

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v19.0/42")
            .query_param("access_token", "page-token")
            .query_param("appsecret_proof", proof.as_str());
        then.status(200).json_body(json!({"id": "42"}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/42").build().unwrap();
    let ctx = CallContext::new().with_page_access_token("page-token");
    let _: Value = client.get_json(&ctx, &url).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn test_not_found() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v19.0/missing");
        then.status(400).json_body(json!({
            "error": {
                "message": "Unsupported get request.",
                "type": "GraphMethodException",
                "code": 100,
                "error_subcode": 33,
                "fbtrace_id": "AbC"
            }
        }));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/missing").build().unwrap();
    let err = client
        .get_json::<Value>(&CallContext::new(), &url)
        .await
        .unwrap_err();

    assert!(graph_client::is_not_found(&err));
    assert_eq!(err.remote().unwrap().fbtrace_id, "AbC");
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_client_error_without_body_is_not_retried() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v19.0/gone");
        then.status(404).json_body(json!({}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/gone").build().unwrap();
    let err = client
        .get_json::<Value>(&CallContext::new(), &url)
        .await
        .unwrap_err();

    match err {
        GraphError::UnexpectedStatus { status, .. } => assert_eq!(status, StatusCode::NOT_FOUND),
        other => panic!("unexpected error: {other}"),
    }
    mock.assert_hits(1);
}

#[tokio::test]
async fn test_server_errors_are_retried_until_budget() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v19.0/flaky");
        then.status(503);
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/flaky").build().unwrap();
    let err = client
        .get_json::<Value>(&CallContext::new(), &url)
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::ServerStatus { .. }));
    assert!(mock.hits() > 1);
}

#[tokio::test]
async fn test_post_json_body() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v19.0/act_1/campaigns")
            .header("content-type", "application/json")
            .json_body(json!({"name": "Spring", "status": "PAUSED"}));
        then.status(200).json_body(json!({"id": "c1", "success": true}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/act_1/campaigns").build().unwrap();
    let reply: MinimalResponse = client
        .post_json(
            &CallContext::new(),
            &url,
            &json!({"name": "Spring", "status": "PAUSED"}),
        )
        .await
        .unwrap();

    assert_eq!(reply.id, "c1");
    assert!(reply.success);
    mock.assert();
}

#[tokio::test]
async fn test_post_form_body() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v19.0/c1")
            .header("content-type", "application/x-www-form-urlencoded")
            .body("status=ACTIVE&name=Spring+sale");
        then.status(200).json_body(json!({"success": true}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/c1").build().unwrap();
    let reply: MinimalResponse = client
        .post_form(
            &CallContext::new(),
            &url,
            &[("status", "ACTIVE"), ("name", "Spring sale")],
        )
        .await
        .unwrap();

    assert!(reply.success);
    mock.assert();
}

#[tokio::test]
async fn test_delete() {
    let server = MockServer::start();

    let ok = server.mock(|when, then| {
        when.method(DELETE).path("/v19.0/c1");
        then.status(200).json_body(json!({"success": true}));
    });
    let denied = server.mock(|when, then| {
        when.method(DELETE).path("/v19.0/c2");
        then.status(403).json_body(json!({}));
    });

    let client = create_client(&server);
    let ctx = CallContext::new();
    client
        .delete(&ctx, &client.route("v19.0", "/c1").build().unwrap())
        .await
        .unwrap();
    let err = client
        .delete(&ctx, &client.route("v19.0", "/c2").build().unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::UnexpectedStatus { .. }));
    ok.assert();
    denied.assert_hits(1);
}

#[tokio::test]
async fn test_upload_file() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v19.0/act_1/advideos")
            .header_exists("content-type");
        then.status(200).json_body(json!({"id": "video-1"}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/act_1/advideos").build().unwrap();
    let reply: Value = client
        .upload_file(
            &CallContext::new(),
            &url,
            "clip.mp4",
            &b"not really a video"[..],
            &[("upload_phase", "transfer")],
        )
        .await
        .unwrap();

    assert_eq!(reply["id"], json!("video-1"));
    mock.assert();
}

#[tokio::test]
async fn test_usage_header_does_not_affect_response() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v19.0/me");
        then.status(200)
            .header("x-app-usage", "{not json")
            .json_body(json!({"id": "1"}));
    });

    let client = create_client(&server);
    let url = client.route("v19.0", "/me").build().unwrap();
    let me: Value = client.get_json(&CallContext::new(), &url).await.unwrap();

    assert_eq!(me["id"], json!("1"));
    mock.assert();
}

#[test]
fn test_config_from_env_defaults() {
    temp_env::with_vars(
        vec![
            ("GRAPH_ACCESS_TOKEN", Some("env-token")),
            ("GRAPH_APP_SECRET", Some("env-secret")),
            ("GRAPH_BASE_URL", None),
            ("GRAPH_TIMEOUT_SECS", None),
        ],
        || {
            let config = GraphClientConfig::from_env().unwrap();
            assert_eq!(config.access_token, "env-token");
            assert_eq!(config.app_secret, "env-secret");
            assert_eq!(config.base_url, "https://graph.facebook.com");
            assert_eq!(config.timeout, Duration::from_secs(60));
        },
    );
}

#[test]
fn test_config_from_env_custom() {
    temp_env::with_vars(
        vec![
            ("GRAPH_ACCESS_TOKEN", Some("env-token")),
            ("GRAPH_APP_SECRET", Some("env-secret")),
            ("GRAPH_BASE_URL", Some("http://localhost:9000")),
            ("GRAPH_TIMEOUT_SECS", Some("5")),
        ],
        || {
            let config = GraphClientConfig::from_env().unwrap();
            assert_eq!(config.base_url, "http://localhost:9000");
            assert_eq!(config.timeout, Duration::from_secs(5));
        },
    );
}

#[test]
fn test_config_from_env_missing_secret() {
    temp_env::with_vars(
        vec![
            ("GRAPH_ACCESS_TOKEN", Some("env-token")),
            ("GRAPH_APP_SECRET", None),
        ],
        || {
            let err = GraphClientConfig::from_env().unwrap_err();
            assert!(matches!(err, GraphError::Config(_)));
        },
    );
}

#[test]
fn test_config_from_env_bad_timeout() {
    temp_env::with_vars(
        vec![
            ("GRAPH_ACCESS_TOKEN", Some("env-token")),
            ("GRAPH_APP_SECRET", Some("env-secret")),
            ("GRAPH_TIMEOUT_SECS", Some("soon")),
        ],
        || {
            assert!(GraphClientConfig::from_env().is_err());
        },
    );
}
