//! [`HttpClient`] backed by reqwest

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::capabilities::{HttpClient, HttpResponse, JsonResponse};
use crate::config::OtaConfig;
use crate::error::OtaError;

/// reqwest client that never follows redirects
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Build a client with the timeout and user agent from `config`
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::InvalidConfig`] if the TLS backend or client
    /// builder fails to initialise.
    pub fn new(config: &OtaConfig) -> Result<Self, OtaError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| OtaError::InvalidConfig(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn transport(e: reqwest::Error) -> OtaError {
    OtaError::Transport(e.to_string())
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn head_no_redirect(&self, url: &str) -> Result<HttpResponse, OtaError> {
        let response = self.client.head(url).send().await.map_err(transport)?;

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        debug!(url, status = response.status().as_u16(), "HEAD");
        Ok(HttpResponse {
            status: response.status().as_u16(),
            headers,
        })
    }

    async fn get_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<JsonResponse, OtaError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        debug!(url, status, bytes = body.len(), "GET");
        Ok(JsonResponse { status, body })
    }
}
