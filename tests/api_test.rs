// Integration tests for the HTTP adapter
//
// The identity provider is scripted in-process; Search Console is faked with
// mockito. Requests go through the full router (CORS, body limit, handlers)
// via tower::ServiceExt::oneshot.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use gsc_bridge::api::{create_app, AppState};
use gsc_bridge::clock::ManualClock;
use gsc_bridge::config::GoogleConfig;
use gsc_bridge::credentials::{CredentialStore, CryptoEnvelope, RefreshGate};
use gsc_bridge::gsc::SearchConsoleClient;
use gsc_bridge::oauth::{IdentityProvider, NonceRegistry, OAuthFlow, StateSigner, TokenGrant};
use gsc_bridge::storage::MemoryStore;
use std::sync::Arc;
use tower::ServiceExt;

const NOW: i64 = 1_700_000_000_000;
const APP_URL: &str = "https://app.test";

struct FakeGoogle;

#[async_trait]
impl IdentityProvider for FakeGoogle {
    fn authorization_url(&self, state: &str) -> String {
        format!(
            "https://accounts.test/o/oauth2/v2/auth?state={}",
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> anyhow::Result<TokenGrant> {
        match code {
            "good" => Ok(TokenGrant {
                access_token: Some("AT1".to_string()),
                refresh_token: Some("RT1".to_string()),
                expiry_epoch_ms: Some(NOW + 3_600_000),
            }),
            "no-refresh" => Ok(TokenGrant {
                access_token: Some("AT1".to_string()),
                refresh_token: None,
                expiry_epoch_ms: None,
            }),
            _ => anyhow::bail!("invalid_grant"),
        }
    }

    async fn refresh_access_token(&self, _refresh_token: &str) -> anyhow::Result<TokenGrant> {
        anyhow::bail!("invalid_grant")
    }
}

struct TestApp {
    router: Router,
    store: Arc<CredentialStore>,
    clock: Arc<ManualClock>,
}

fn create_test_app(gsc_base_url: &str) -> TestApp {
    let clock = Arc::new(ManualClock::new(NOW));
    let store = Arc::new(CredentialStore::new(
        Arc::new(MemoryStore::new()),
        CryptoEnvelope::new(&[0u8; 32]),
        clock.clone(),
    ));
    let provider = Arc::new(FakeGoogle);

    let flow = OAuthFlow::new(
        NonceRegistry::new(Arc::new(MemoryStore::new()), clock.clone(), 600_000),
        StateSigner::new(b"test-state-secret".to_vec()).unwrap(),
        provider.clone(),
        store.clone(),
        clock.clone(),
        vec!["scope".to_string()],
    );
    let gate = RefreshGate::new(store.clone(), provider, clock.clone());

    let gsc = SearchConsoleClient::new(&GoogleConfig {
        api_base_url: gsc_base_url.to_string(),
        inspection_base_url: gsc_base_url.to_string(),
        ..GoogleConfig::default()
    });

    let state = AppState {
        flow: Arc::new(flow),
        refresh_gate: Arc::new(gate),
        gsc,
        app_url: APP_URL.to_string(),
    };

    TestApp {
        router: create_app(state, 1024).unwrap(),
        store,
        clock,
    }
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Runs /start and returns the state parameter from the redirect.
async fn start_flow(app: &TestApp, workspace: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!(
            "/oauth/google/start?workspaceId={}",
            workspace
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let url = location(&response);
    let encoded = url.split("state=").nth(1).unwrap();
    urlencoding::decode(encoded).unwrap().into_owned()
}

fn callback_uri(code: &str, state: &str) -> String {
    format!(
        "/oauth/google/callback?code={}&state={}",
        code,
        urlencoding::encode(state)
    )
}

#[tokio::test]
async fn test_health() {
    let app = create_test_app("http://127.0.0.1:1");
    let response = app.router.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn test_connect_flow_redirects_to_app() {
    let app = create_test_app("http://127.0.0.1:1");
    let state = start_flow(&app, "acme").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("good", &state)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "https://app.test/settings/integrations?workspaceId=acme&status=connected"
    );
    assert!(app.store.is_connected("acme"));
}

#[tokio::test]
async fn test_start_defaults_to_demo_workspace() {
    let app = create_test_app("http://127.0.0.1:1");
    let response = app
        .router
        .clone()
        .oneshot(get_request("/oauth/google/start"))
        .await
        .unwrap();
    let url = location(&response);
    let state = urlencoding::decode(url.split("state=").nth(1).unwrap())
        .unwrap()
        .into_owned();

    let response = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("good", &state)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.store.is_connected("demo"));
}

#[tokio::test]
async fn test_replayed_callback_rejected() {
    let app = create_test_app("http://127.0.0.1:1");
    let state = start_flow(&app, "demo").await;

    let first = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("good", &state)))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::SEE_OTHER);

    let replay = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("good", &state)))
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tampered_state_rejected() {
    let app = create_test_app("http://127.0.0.1:1");
    let state = start_flow(&app, "demo").await;
    let tampered = format!("{}x", state);

    let response = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("good", &tampered)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!app.store.is_connected("demo"));
}

#[tokio::test]
async fn test_callback_missing_params() {
    let app = create_test_app("http://127.0.0.1:1");

    for uri in [
        "/oauth/google/callback",
        "/oauth/google/callback?code=good",
        "/oauth/google/callback?state=abc.def",
        "/oauth/google/callback?code=&state=",
    ] {
        let response = app.router.clone().oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "uri: {}", uri);
    }
}

#[tokio::test]
async fn test_callback_provider_error() {
    let app = create_test_app("http://127.0.0.1:1");
    let response = app
        .router
        .oneshot(get_request(
            "/oauth/google/callback?error=access_denied&error_description=User+cancelled",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_bad_code_is_bad_gateway() {
    let app = create_test_app("http://127.0.0.1:1");
    let state = start_flow(&app, "demo").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("expired-code", &state)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_missing_refresh_token_requires_reconsent() {
    let app = create_test_app("http://127.0.0.1:1");
    let state = start_flow(&app, "demo").await;

    let response = app
        .router
        .clone()
        .oneshot(get_request(&callback_uri("no-refresh", &state)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("refresh token"));
    assert!(!app.store.is_connected("demo"));
}

#[tokio::test]
async fn test_sites_not_connected() {
    let app = create_test_app("http://127.0.0.1:1");
    let response = app
        .router
        .oneshot(get_request("/gsc/sites?workspaceId=ghost"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sites_uses_cached_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/webmasters/v3/sites")
        .match_header("authorization", "Bearer AT1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"siteEntry":[]}"#)
        .create_async()
        .await;

    let app = create_test_app(&server.url());
    app.store
        .set_tokens("demo", "AT1", "RT1", NOW + 3_600_000, ["scope"])
        .unwrap();

    let response = app
        .router
        .oneshot(get_request("/gsc/sites?workspaceId=demo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({"siteEntry": []}));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_sites_refresh_failure_is_bad_gateway() {
    let app = create_test_app("http://127.0.0.1:1");
    app.store
        .set_tokens("demo", "AT1", "RT1", NOW + 3_600_000, ["scope"])
        .unwrap();
    app.clock.set(NOW + 3_600_000);

    let response = app
        .router
        .oneshot(get_request("/gsc/sites?workspaceId=demo"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    // Stored credentials survive a failed refresh
    let creds = app.store.get_tokens("demo").unwrap().unwrap();
    assert_eq!(creds.access_token, "AT1");
}

#[tokio::test]
async fn test_inspect_requires_urls() {
    let app = create_test_app("http://127.0.0.1:1");
    app.store
        .set_tokens("demo", "AT1", "RT1", NOW + 3_600_000, ["scope"])
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/gsc/inspect?workspaceId=demo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"siteUrl":"sc-domain:example.com"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inspect_without_json_body_is_bad_request() {
    let app = create_test_app("http://127.0.0.1:1");
    app.store
        .set_tokens("demo", "AT1", "RT1", NOW + 3_600_000, ["scope"])
        .unwrap();

    let requests = [
        // No body, no content type
        Request::builder()
            .method("POST")
            .uri("/gsc/inspect?workspaceId=demo")
            .body(Body::empty())
            .unwrap(),
        // Form body
        Request::builder()
            .method("POST")
            .uri("/gsc/inspect?workspaceId=demo")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("inspectionUrl=x&siteUrl=y"))
            .unwrap(),
        // Malformed JSON
        Request::builder()
            .method("POST")
            .uri("/gsc/inspect?workspaceId=demo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    ];

    for request in requests {
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "Missing inspectionUrl or siteUrl");
    }
}

#[tokio::test]
async fn test_inspect_forwards_downstream_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/urlInspection/index:inspect")
        .with_status(403)
        .with_body("PERMISSION_DENIED")
        .create_async()
        .await;

    let app = create_test_app(&server.url());
    app.store
        .set_tokens("demo", "AT1", "RT1", NOW + 3_600_000, ["scope"])
        .unwrap();

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/gsc/inspect?workspaceId=demo")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"inspectionUrl":"https://example.com/","siteUrl":"sc-domain:example.com"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = json_body(response).await;
    assert!(json["error"].as_str().unwrap().contains("PERMISSION_DENIED"));
}

#[tokio::test]
async fn test_body_limit_enforced() {
    let app = create_test_app("http://127.0.0.1:1");
    let big = format!(r#"{{"inspectionUrl":"{}","siteUrl":"x"}}"#, "a".repeat(4096));

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/gsc/inspect")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(big))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_allows_app_origin() {
    let app = create_test_app("http://127.0.0.1:1");
    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/gsc/sites")
                .header(header::ORIGIN, APP_URL)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        APP_URL
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}
