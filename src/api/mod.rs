//! HTTP adapter over the OAuth flow, refresh gate, and Search Console client.
//!
//! Handlers only translate between HTTP and the core; every security decision
//! lives in [`crate::oauth`] and [`crate::credentials`].

pub mod gsc;
pub mod oauth;

use crate::credentials::RefreshGate;
use crate::error::{OAuthError, Result};
use crate::gsc::SearchConsoleClient;
use crate::oauth::OAuthFlow;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Workspace used when a request does not name one
pub const DEFAULT_WORKSPACE: &str = "demo";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<OAuthFlow>,
    pub refresh_gate: Arc<RefreshGate>,
    pub gsc: SearchConsoleClient,
    /// Frontend base URL for post-connect redirects
    pub app_url: String,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Application error types for HTTP endpoints
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    ServerError(String),
    BadGateway(String),
    PayloadTooLarge(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<OAuthError> for AppError {
    fn from(err: OAuthError) -> Self {
        let msg = err.to_string();
        match err {
            OAuthError::Format(_)
            | OAuthError::InvalidSignature
            | OAuthError::ExpiredOrConsumed
            | OAuthError::MissingRefreshToken => AppError::BadRequest(msg),
            OAuthError::NotConnected(_) => AppError::NotFound(msg),
            OAuthError::ExchangeFailed(_) | OAuthError::RefreshFailed(_) => {
                AppError::BadGateway(msg)
            }
            OAuthError::Config(_) | OAuthError::Authentication => AppError::ServerError(msg),
        }
    }
}

/// `?workspaceId=` query parameter
#[derive(Deserialize, Debug, Default)]
pub struct WorkspaceQuery {
    #[serde(rename = "workspaceId")]
    pub workspace_id: Option<String>,
}

impl WorkspaceQuery {
    pub fn workspace(&self) -> &str {
        self.workspace_id
            .as_deref()
            .filter(|w| !w.is_empty())
            .unwrap_or(DEFAULT_WORKSPACE)
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// Builds the full router: health, OAuth, and Search Console endpoints
/// behind CORS (allowing only `app_url`) and a request body limit.
pub fn create_app(state: AppState, body_limit_bytes: usize) -> Result<Router> {
    let origin = HeaderValue::from_str(&state.app_url)
        .map_err(|_| OAuthError::Config(format!("invalid APP_URL '{}'", state.app_url)))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    let state = Arc::new(state);

    Ok(Router::new()
        .route("/health", get(health))
        .merge(oauth::create_oauth_router(Arc::clone(&state)))
        .merge(gsc::create_gsc_router(state))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(cors))
}
