//! The sandboxed outbound-fetch facade handed to plugin handlers.

use std::sync::Arc;

use kb_core::error::{ErrorCode, PluginError};
use kb_permissions::PermissionEvaluator;

/// A fetch response as handed back to a handler.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
    /// Response headers, lower-cased keys.
    pub headers: Vec<(String, String)>,
}

/// The sandboxed fetch facade: a thin wrapper over an HTTP client that first
/// confirms the target against `network.fetch`, per spec §4.2.
pub struct FetchShim {
    evaluator: Arc<PermissionEvaluator>,
    client: reqwest::Client,
}

impl FetchShim {
    /// Build a facade bound to `evaluator`, using `client` for the actual
    /// outbound request.
    #[must_use]
    pub fn new(evaluator: Arc<PermissionEvaluator>, client: reqwest::Client) -> Self {
        Self { evaluator, client }
    }

    /// Issue a GET request to `url`, denying first if the host/URL is not
    /// covered by `network.fetch`.
    pub async fn get(&self, url: &str) -> Result<FetchResponse, PluginError> {
        self.authorize(url)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(&e))?;
        to_fetch_response(response).await
    }

    /// Issue a POST request to `url` with a JSON body, denying first if the
    /// host/URL is not covered by `network.fetch`.
    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<FetchResponse, PluginError> {
        self.authorize(url)?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| network_error(&e))?;
        to_fetch_response(response).await
    }

    fn authorize(&self, url: &str) -> Result<(), PluginError> {
        let host = extract_host(url).unwrap_or_else(|| url.to_string());
        self.evaluator.check_fetch(&host).or_else(|_| {
            self.evaluator
                .check_fetch(url)
                .map_err(|denial| permission_denied(&denial))
        })
    }
}

fn extract_host(url: &str) -> Option<String> {
    reqwest::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string))
}

async fn to_fetch_response(response: reqwest::Response) -> Result<FetchResponse, PluginError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| (k.as_str().to_ascii_lowercase(), v.to_str().unwrap_or("").to_string()))
        .collect();
    let body = response.bytes().await.map_err(|e| network_error(&e))?.to_vec();
    Ok(FetchResponse {
        status,
        body,
        headers,
    })
}

fn permission_denied(denial: &kb_permissions::PermissionDenial) -> PluginError {
    PluginError::new(ErrorCode::PermissionDenied, denial.message())
        .with_details(serde_json::json!({ "target": denial.subject() }))
}

fn network_error(err: &reqwest::Error) -> PluginError {
    PluginError::new(ErrorCode::InternalError, err.to_string())
}
