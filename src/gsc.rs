//! Google Search Console API client.
//!
//! Thin wrapper over the two endpoints the service exposes. Callers supply a
//! valid access token (see [`RefreshGate`](crate::credentials::RefreshGate)).

use crate::config::GoogleConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// URL Inspection request body
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InspectRequest {
    pub inspection_url: String,
    pub site_url: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

fn default_language_code() -> String {
    "en-US".to_string()
}

#[derive(Clone)]
pub struct SearchConsoleClient {
    http_client: reqwest::Client,
    api_base_url: String,
    inspection_base_url: String,
}

impl SearchConsoleClient {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            inspection_base_url: config.inspection_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Lists the sites the connected account can access.
    pub async fn list_sites(&self, access_token: &str) -> Result<Value> {
        let response = self
            .http_client
            .get(format!("{}/webmasters/v3/sites", self.api_base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .context("Failed to send GSC sites request")?;

        read_json(response, "GSC sites").await
    }

    /// Runs a URL inspection for `request.inspection_url` within `request.site_url`.
    pub async fn inspect_url(&self, access_token: &str, request: &InspectRequest) -> Result<Value> {
        let response = self
            .http_client
            .post(format!(
                "{}/v1/urlInspection/index:inspect",
                self.inspection_base_url
            ))
            .bearer_auth(access_token)
            .json(request)
            .send()
            .await
            .context("Failed to send URL Inspection request")?;

        read_json(response, "URL Inspection").await
    }
}

async fn read_json(response: reqwest::Response, label: &str) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("Failed to read {} response", label))?;

    if !status.is_success() {
        return Err(anyhow!("{} error {}: {}", label, status.as_u16(), body));
    }

    serde_json::from_str(&body).with_context(|| format!("Failed to parse {} response", label))
}
