use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GmailError, Result};

/// Environment variable naming the watch label
pub const LABEL_ENV_VAR: &str = "LABEL_TO_WATCH";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Marker label applied to processed threads
    #[serde(default)]
    pub label_to_watch: String,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Filter used to build the search query of each pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Restrict to messages carrying the literal `test` label
    #[serde(default)]
    pub test_label_only: bool,
    #[serde(default = "default_unread_only")]
    pub unread_only: bool,
    #[serde(default = "default_newer_than")]
    pub newer_than: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_include_spam_trash")]
    pub include_spam_trash: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            test_label_only: false,
            unread_only: default_unread_only(),
            newer_than: default_newer_than(),
            max_results: default_max_results(),
            include_spam_trash: default_include_spam_trash(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyConfig {
    #[serde(default = "default_reply_body")]
    pub body: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            body: default_reply_body(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            run_on_start: default_run_on_start(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LabelConfig {
    /// Add the id returned by the create call instead of the pre-creation lookup result
    #[serde(default)]
    pub use_created_label_id: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials: PathBuf,
    #[serde(default = "default_token_path")]
    pub token: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            credentials: default_credentials_path(),
            token: default_token_path(),
        }
    }
}

fn default_unread_only() -> bool {
    true
}

fn default_newer_than() -> String {
    "1d".to_string()
}

fn default_max_results() -> u32 {
    10
}

fn default_include_spam_trash() -> bool {
    true
}

fn default_reply_body() -> String {
    "This is an automated reply.".to_string()
}

fn default_interval_secs() -> u64 {
    45
}

fn default_run_on_start() -> bool {
    true
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

impl Config {
    /// Load the TOML file (defaults when absent) and merge `LABEL_TO_WATCH`
    ///
    /// The result is not validated; call [`Config::validate`] once all
    /// overrides are applied.
    pub async fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                GmailError::ConfigError(format!("Failed to read config file: {}", e))
            })?;
            let config = Self::from_toml(&content)?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GmailError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    /// Environment wins over the file for the watch label
    pub fn apply_env(&mut self) {
        if let Ok(label) = std::env::var(LABEL_ENV_VAR) {
            if !label.trim().is_empty() {
                self.label_to_watch = label.trim().to_string();
            }
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.label_to_watch.trim().is_empty() {
            return Err(GmailError::ConfigError(format!(
                "No watch label configured. Set {} or label_to_watch in the config file",
                LABEL_ENV_VAR
            )));
        }
        if self.label_to_watch.contains('"') {
            return Err(GmailError::ConfigError(
                "label_to_watch cannot contain quotes".to_string(),
            ));
        }

        if self.query.newer_than.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "query.newer_than cannot be empty".to_string(),
            ));
        }
        if self.query.max_results == 0 {
            return Err(GmailError::ConfigError(
                "query.max_results must be at least 1".to_string(),
            ));
        }
        if self.query.max_results > 500 {
            return Err(GmailError::ConfigError(
                "query.max_results cannot exceed 500 (Gmail list page limit)".to_string(),
            ));
        }

        if self.reply.body.trim().is_empty() {
            return Err(GmailError::ConfigError(
                "reply.body cannot be empty".to_string(),
            ));
        }

        if self.schedule.interval_secs == 0 {
            return Err(GmailError::ConfigError(
                "schedule.interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
