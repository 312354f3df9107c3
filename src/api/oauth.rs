//! Google OAuth endpoints.

use super::{AppError, AppState, WorkspaceQuery};
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// OAuth callback query parameters
#[derive(Deserialize, Debug)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub fn create_oauth_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/oauth/google/start", get(oauth_start))
        .route("/oauth/google/callback", get(oauth_callback))
        .with_state(state)
}

/// GET /oauth/google/start?workspaceId=demo
///
/// Redirects the user to Google's consent page with a signed, single-use state.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WorkspaceQuery>,
) -> Result<Redirect, AppError> {
    let workspace_id = query.workspace();
    debug!(workspace_id = %workspace_id, "OAuth start requested");

    let auth_url = state.flow.start_authorization(workspace_id)?;
    Ok(Redirect::temporary(&auth_url))
}

/// GET /oauth/google/callback?code=...&state=...
///
/// Completes the flow and sends the user back to the app's integrations page.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<OAuthCallback>,
) -> Result<Redirect, AppError> {
    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "OAuth authorization failed");
        return Err(AppError::BadRequest(format!(
            "OAuth authorization failed: {} - {}",
            error, description
        )));
    }

    let (code, csrf_state) = match (callback.code, callback.state) {
        (Some(code), Some(csrf_state)) if !code.is_empty() && !csrf_state.is_empty() => {
            (code, csrf_state)
        }
        _ => return Err(AppError::BadRequest("Missing code or state".to_string())),
    };

    let workspace_id = state.flow.handle_callback(&code, &csrf_state).await?;

    Ok(Redirect::to(&format!(
        "{}/settings/integrations?workspaceId={}&status=connected",
        state.app_url.trim_end_matches('/'),
        urlencoding::encode(&workspace_id)
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_callback_deserialization() {
        // Success case
        let query = "code=4%2F0Ab&state=eyJ3.c2ln";
        let callback: OAuthCallback = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.code, Some("4/0Ab".to_string()));
        assert_eq!(callback.state, Some("eyJ3.c2ln".to_string()));
        assert_eq!(callback.error, None);

        // Error case
        let query = "error=access_denied&error_description=User+cancelled";
        let callback: OAuthCallback = serde_urlencoded::from_str(query).unwrap();
        assert_eq!(callback.error, Some("access_denied".to_string()));
        assert_eq!(callback.error_description, Some("User cancelled".to_string()));
        assert_eq!(callback.code, None);
    }
}
