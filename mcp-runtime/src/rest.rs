//! Authenticated JSON client for the Slide REST API.

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use slide_core::ServerConfig;
use slide_core::error::tool_codes;

use crate::args::ListQuery;
use crate::error::ToolError;
use crate::util::http_client;

pub const API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SlideClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SlideClient {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_timeout(config, API_TIMEOUT)
    }

    pub fn with_timeout(config: &ServerConfig, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends one request and returns the raw body of a 2xx response.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Vec<u8>, ToolError> {
        let mut url = reqwest::Url::parse(&format!("{}{}", self.base_url, path)).map_err(|e| {
            ToolError::new(tool_codes::CONNECTION_ERROR, format!("invalid API URL: {e}"))
        })?;
        if !query.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in query {
                qp.append_pair(k, v);
            }
        }

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        tracing::debug!(event = "slide_api_request", method = %method, path = %path);
        let response = request.send().await.map_err(|e| {
            let message = if e.is_timeout() {
                "request failed: timed out".to_string()
            } else {
                format!("request failed: {e}")
            };
            tracing::warn!(event = "slide_api_unreachable", method = %method, path = %path, error = %e);
            ToolError::new(tool_codes::CONNECTION_ERROR, message)
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            ToolError::new(
                tool_codes::CONNECTION_ERROR,
                format!("failed to read response: {e}"),
            )
        })?;
        if !status.is_success() {
            tracing::warn!(
                event = "slide_api_error",
                method = %method,
                path = %path,
                status = status.as_u16(),
            );
            return Err(ToolError::new(
                tool_codes::API_ERROR,
                format!(
                    "API error {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&bytes)
                ),
            ));
        }
        Ok(bytes.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<T, ToolError> {
        let bytes = self.send(method, path, query, body).await?;
        parse_body(&bytes)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ToolError> {
        self.send_json(Method::GET, path, &[], None).await
    }

    pub async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> Result<T, ToolError> {
        self.send_json(Method::GET, path, query.pairs(), None).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ToolError> {
        self.send_json(Method::POST, path, &[], body).await
    }

    pub async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ToolError> {
        self.send_json(Method::PATCH, path, &[], Some(body)).await
    }

    /// Deletes ignore the response body.
    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<(), ToolError> {
        self.send(Method::DELETE, path, &[], body).await.map(|_| ())
    }
}

/// Empty bodies parse as JSON `null` so action endpoints answering 204 still succeed.
fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ToolError> {
    let trimmed = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        bytes
    };
    serde_json::from_slice(trimmed).map_err(|e| {
        ToolError::new(
            tool_codes::PARSE_ERROR,
            format!("failed to parse response: {e}"),
        )
    })
}
