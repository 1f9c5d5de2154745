// ABOUTME: Redmine connection settings.
// ABOUTME: Deserialized from the [redmine] table of the bot config file.

use crate::error::{RedmineError, Result};
use serde::Deserialize;

/// Redmine REST API settings.
#[derive(Clone, Deserialize)]
pub struct RedmineConfig {
    /// Base URL of the Redmine instance (e.g., "https://redmine.example.com").
    pub url: String,
    /// REST API key sent as `X-Redmine-API-Key`.
    pub api_key: String,
    /// Status ids that count as closed.
    #[serde(default)]
    pub closed_statuses: Vec<u64>,
    /// Priority ids whose name is shown in summaries.
    #[serde(default)]
    pub high_priorities: Vec<u64>,
}

impl std::fmt::Debug for RedmineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedmineConfig")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .field("closed_statuses", &self.closed_statuses)
            .field("high_priorities", &self.high_priorities)
            .finish()
    }
}

impl RedmineConfig {
    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url().is_empty() {
            return Err(RedmineError::Config("redmine.url is required".into()));
        }
        let parsed = url::Url::parse(self.base_url())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RedmineError::Config(
                "redmine.url must be an http:// or https:// URL".into(),
            ));
        }
        if self.api_key.is_empty() {
            return Err(RedmineError::Config("redmine.api_key is required".into()));
        }
        Ok(())
    }
}
