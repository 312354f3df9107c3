//! Search Console endpoints.
//!
//! Each request obtains a fresh-enough access token through the refresh gate
//! before calling Google.

use super::{AppError, AppState, WorkspaceQuery};
use crate::gsc::InspectRequest;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// POST /gsc/inspect body; fields are optional so missing ones map to 400
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct InspectBody {
    inspection_url: Option<String>,
    site_url: Option<String>,
    language_code: Option<String>,
}

pub fn create_gsc_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/gsc/sites", get(list_sites))
        .route("/gsc/inspect", post(inspect_url))
        .with_state(state)
}

/// GET /gsc/sites?workspaceId=demo
async fn list_sites(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Result<Json<Value>, AppError> {
    let workspace_id = query.workspace();
    let token = state
        .refresh_gate
        .get_valid_access_token(workspace_id)
        .await?;

    let sites = state.gsc.list_sites(&token).await.map_err(|e| {
        error!(workspace_id = %workspace_id, error = %e, "GSC sites call failed");
        AppError::BadGateway(e.to_string())
    })?;

    Ok(Json(sites))
}

/// POST /gsc/inspect?workspaceId=demo  body { inspectionUrl, siteUrl, languageCode? }
async fn inspect_url(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
    body: Result<Json<InspectBody>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let workspace_id = query.workspace();

    // Absent or unparseable JSON counts as missing fields; an oversized body
    // keeps its own status
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            return Err(AppError::PayloadTooLarge(rejection.body_text()))
        }
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "Unusable inspect body");
            InspectBody::default()
        }
    };

    let request = match (body.inspection_url, body.site_url) {
        (Some(inspection_url), Some(site_url))
            if !inspection_url.is_empty() && !site_url.is_empty() =>
        {
            InspectRequest {
                inspection_url,
                site_url,
                language_code: body
                    .language_code
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "en-US".to_string()),
            }
        }
        _ => {
            return Err(AppError::BadRequest(
                "Missing inspectionUrl or siteUrl".to_string(),
            ))
        }
    };

    let token = state
        .refresh_gate
        .get_valid_access_token(workspace_id)
        .await?;

    // URL Inspection often answers PERMISSION_DENIED; surface Google's body as-is
    let result = state.gsc.inspect_url(&token, &request).await.map_err(|e| {
        error!(workspace_id = %workspace_id, error = %e, "URL Inspection call failed");
        AppError::BadGateway(e.to_string())
    })?;

    Ok(Json(result))
}
