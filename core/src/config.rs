use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub const SERVER_NAME: &str = "slide-mcp-server";
pub const SERVER_VERSION: &str = "2.3.0";
pub const DEFAULT_BASE_URL: &str = "https://api.slide.tech";

/// Permission tier selecting which tools and operations a client may reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolsMode {
    Reporting,
    Restores,
    #[default]
    FullSafe,
    Full,
}

impl ToolsMode {
    pub const ALL: [ToolsMode; 4] = [
        ToolsMode::Reporting,
        ToolsMode::Restores,
        ToolsMode::FullSafe,
        ToolsMode::Full,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolsMode::Reporting => "reporting",
            ToolsMode::Restores => "restores",
            ToolsMode::FullSafe => "full-safe",
            ToolsMode::Full => "full",
        }
    }
}

impl fmt::Display for ToolsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolsMode {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ToolsMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == raw.trim())
            .ok_or_else(|| ConfigError::InvalidToolsMode(raw.to_string()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid tools mode '{0}'. Valid options: reporting, restores, full-safe, full")]
    InvalidToolsMode(String),
    #[error("API key is required. Set it with --api-key or the SLIDE_API_KEY environment variable")]
    MissingApiKey,
    #[error("invalid --args JSON: {0}")]
    InvalidToolArgs(String),
}

/// Process-wide settings, built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub api_key: String,
    pub base_url: String,
    pub tools_mode: ToolsMode,
    pub disabled_tools: BTreeSet<String>,
    pub enable_presentation: bool,
    pub enable_reports: bool,
}

impl ServerConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        let base_url = base_url.into();
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim().trim_end_matches('/').to_string()
        };
        Ok(Self {
            api_key,
            base_url,
            tools_mode: ToolsMode::default(),
            disabled_tools: BTreeSet::new(),
            enable_presentation: false,
            enable_reports: false,
        })
    }

    pub fn with_tools_mode(mut self, mode: ToolsMode) -> Self {
        self.tools_mode = mode;
        self
    }

    pub fn with_disabled_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_presentation(mut self, enabled: bool) -> Self {
        self.enable_presentation = enabled;
        self
    }

    pub fn with_reports(mut self, enabled: bool) -> Self {
        self.enable_reports = enabled;
        self
    }

    pub fn is_disabled(&self, tool: &str) -> bool {
        self.disabled_tools.contains(tool)
    }

    /// Reporting-style meta operations ride on either gate.
    pub fn reporting_features_enabled(&self) -> bool {
        self.enable_presentation || self.enable_reports
    }
}

/// Splits a comma-separated deny-list, trimming entries and dropping empties.
pub fn parse_disabled_tools(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Environment gates accept `true` or `1`.
pub fn parse_env_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true") | Some("1"))
}
