// ABOUTME: Configuration loading and validation for the Mattermost bot.
// ABOUTME: Supports TOML config files with .env loading and environment variable expansion.

use crate::error::{BridgeError, Result};
use redbot_redmine::RedmineConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Top-level configuration structure for redbot.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mattermost: MattermostConfig,
    pub redmine: RedmineConfig,
}

/// Mattermost server connection and bot behavior.
#[derive(Clone, Deserialize)]
pub struct MattermostConfig {
    /// Server URL (e.g., "https://chat.example.com").
    pub url: String,
    /// Bot account access token.
    pub token: String,

    /// How often to join public channels the bot is not yet a member of.
    #[serde(default = "default_channel_join_minutes")]
    pub channel_join_minutes: u64,

    /// Maximum lifetime of one websocket before it is replaced (0 = never rotate).
    #[serde(default = "default_socket_lifetime_minutes")]
    pub socket_lifetime_minutes: u64,

    /// Start a thread under top-level messages instead of replying in the channel.
    #[serde(default)]
    pub thread_replies: bool,

    /// Base delay between reconnect attempts after a failed connect.
    #[serde(default = "default_reconnect_delay_seconds")]
    pub reconnect_delay_seconds: u64,
}

impl std::fmt::Debug for MattermostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .field("channel_join_minutes", &self.channel_join_minutes)
            .field("socket_lifetime_minutes", &self.socket_lifetime_minutes)
            .field("thread_replies", &self.thread_replies)
            .field("reconnect_delay_seconds", &self.reconnect_delay_seconds)
            .finish()
    }
}

fn default_channel_join_minutes() -> u64 {
    15
}

fn default_socket_lifetime_minutes() -> u64 {
    360
}

fn default_reconnect_delay_seconds() -> u64 {
    5
}

/// One week.
const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
const MAX_RECONNECT_DELAY_SECONDS: u64 = 3600;

fn check_range(key: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(BridgeError::Config(format!(
            "{} must be between {} and {}, got {}",
            key, min, max, value
        )))
    }
}

impl MattermostConfig {
    pub fn channel_join_interval(&self) -> Duration {
        Duration::from_secs(self.channel_join_minutes * 60)
    }

    /// `None` when socket rotation is disabled.
    pub fn socket_lifetime(&self) -> Option<Duration> {
        (self.socket_lifetime_minutes > 0)
            .then(|| Duration::from_secs(self.socket_lifetime_minutes * 60))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

impl Config {
    /// Load configuration from the specified path or default location.
    ///
    /// Default location: `~/.config/redbot/bot.toml`. A `.env` file in the
    /// working directory is loaded first so `${VAR}` references can use it.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let path = path
            .or_else(|| dirs::config_dir().map(|d| d.join("redbot").join("bot.toml")))
            .ok_or_else(|| BridgeError::Config("Could not determine config path".into()))?;

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config from {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse and validate config text, expanding environment variables.
    pub fn parse(contents: &str) -> Result<Self> {
        let contents = shellexpand::env_with_context_no_errors(contents, |var: &str| {
            match std::env::var(var) {
                Ok(val) => Some(val),
                Err(_) => {
                    warn!(
                        variable = %var,
                        "Environment variable not defined, using empty string"
                    );
                    Some(String::new())
                }
            }
        });

        let config: Config = toml::from_str(&contents)
            .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate that required fields are present and properly formatted.
    fn validate(&self) -> Result<()> {
        let mm = &self.mattermost;
        if mm.url.trim().is_empty() {
            return Err(BridgeError::Config("mattermost.url is required".into()));
        }
        let parsed = url::Url::parse(mm.url.trim())
            .map_err(|e| BridgeError::Config(format!("mattermost.url is invalid: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::Config(
                "mattermost.url must be an http:// or https:// URL".into(),
            ));
        }
        if mm.token.is_empty() {
            return Err(BridgeError::Config("mattermost.token is required".into()));
        }
        check_range(
            "mattermost.channel_join_minutes",
            mm.channel_join_minutes,
            1,
            MAX_INTERVAL_MINUTES,
        )?;
        check_range(
            "mattermost.socket_lifetime_minutes",
            mm.socket_lifetime_minutes,
            0,
            MAX_INTERVAL_MINUTES,
        )?;
        check_range(
            "mattermost.reconnect_delay_seconds",
            mm.reconnect_delay_seconds,
            1,
            MAX_RECONNECT_DELAY_SECONDS,
        )?;

        self.redmine
            .validate()
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(())
    }
}
