use std::sync::Arc;
use std::time::Duration;

use slide_core::ServerConfig;

use crate::rest::{API_TIMEOUT, SlideClient};
use crate::util::http_client;

pub const TEMPLATE_BASE_URL: &str = "https://raw.githubusercontent.com/amcchord/slideReports/main";
pub const CARD_BASE_URL: &str =
    "https://raw.githubusercontent.com/amcchord/slideReports/refs/heads/main/cards";
pub const DOCS_BASE_URL: &str = "https://docs.slide.tech";
pub const OPENAPI_URL: &str = "http://api.slide.tech/openapi.json";

/// Third-party locations the presentation and docs tools read from.
#[derive(Debug, Clone)]
pub struct ExternalSources {
    pub template_base: String,
    pub card_base: String,
    pub docs_base: String,
    pub openapi_url: String,
}

impl Default for ExternalSources {
    fn default() -> Self {
        Self {
            template_base: TEMPLATE_BASE_URL.to_string(),
            card_base: CARD_BASE_URL.to_string(),
            docs_base: DOCS_BASE_URL.to_string(),
            openapi_url: OPENAPI_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Everything an operation handler may touch. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub config: Arc<ServerConfig>,
    pub api: SlideClient,
    pub sources: Arc<ExternalSources>,
    web: reqwest::Client,
}

impl ToolContext {
    pub fn new(config: Arc<ServerConfig>) -> Self {
        Self::with_sources(config, ExternalSources::default())
    }

    pub fn with_sources(config: Arc<ServerConfig>, sources: ExternalSources) -> Self {
        Self {
            api: SlideClient::new(&config),
            config,
            sources: Arc::new(sources),
            web: http_client(API_TIMEOUT),
        }
    }

    /// Fetches a public text document with its own timeout.
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, String> {
        self.fetch_page(url, timeout).await.map(|page| page.body)
    }

    pub async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, String> {
        let response = self
            .web
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| format!("failed to fetch {url}: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("failed to fetch {url}: HTTP {}", status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read {url}: {e}"))?;
        Ok(FetchedPage {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}
