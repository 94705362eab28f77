use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AdsightError, Result};

/// Environment variable overriding `inference.api_key`.
pub const ENV_INFERENCE_API_KEY: &str = "ADSIGHT_INFERENCE_API_KEY";
/// Environment variable overriding `warehouse.api_key`.
pub const ENV_WAREHOUSE_API_KEY: &str = "ADSIGHT_WAREHOUSE_API_KEY";

/// Top-level configuration for the adsight service.
///
/// Loaded from `~/.adsight/config.toml` by default. Each section corresponds
/// to one collaborator or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply secret overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_INFERENCE_API_KEY).filter(|k| !k.is_empty()) {
            self.inference.api_key = key;
        }
        if let Some(key) = lookup(ENV_WAREHOUSE_API_KEY).filter(|k| !k.is_empty()) {
            self.warehouse.api_key = Some(key);
        }
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.stream_timeout_secs == 0 {
            return Err(AdsightError::Config(
                "server.stream_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.server.worker_pool_size == 0 {
            return Err(AdsightError::Config(
                "server.worker_pool_size must be greater than 0".into(),
            ));
        }
        if self.server.max_message_chars == 0 {
            return Err(AdsightError::Config(
                "server.max_message_chars must be greater than 0".into(),
            ));
        }
        if self.warehouse.poll_interval_ms == 0 {
            return Err(AdsightError::Config(
                "warehouse.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.warehouse.tables.is_empty() {
            return Err(AdsightError::Config(
                "warehouse.tables must describe at least one table".into(),
            ));
        }
        if self.chat.history_limit == 0 {
            return Err(AdsightError::Config(
                "chat.history_limit must be greater than 0".into(),
            ));
        }
        if self.inference.model.trim().is_empty() {
            return Err(AdsightError::Config("inference.model must be set".into()));
        }
        Ok(())
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = path
        .strip_prefix("~/")
        .or_else(|| path.strip_prefix("~\\"));
    match rest {
        Some(rest) => home_dir().join(rest),
        None => PathBuf::from(path),
    }
}

/// Default config file location, `~/.adsight/config.toml`.
pub fn default_config_path() -> PathBuf {
    home_dir().join(".adsight").join("config.toml")
}

fn home_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    PathBuf::from(home.unwrap_or_else(|_| ".".to_string()))
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Hard lifetime ceiling of one chat stream, in seconds.
    pub stream_timeout_secs: u64,
    /// Maximum number of chat turns processed concurrently.
    pub worker_pool_size: usize,
    /// Maximum length of an inbound chat message, in characters.
    pub max_message_chars: usize,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            stream_timeout_secs: 180,
            worker_pool_size: 16,
            max_message_chars: 2000,
            log_level: "info".to_string(),
        }
    }
}

/// Bearer-token authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token -> user id.
    pub tokens: HashMap<String, String>,
    /// Where the generated local token is kept when `tokens` is empty.
    pub token_file: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tokens: HashMap::new(),
            token_file: "~/.adsight/api_token".to_string(),
        }
    }
}

/// Conversation/message persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file.
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "~/.adsight/data/adsight.db".to_string(),
        }
    }
}

/// Remote text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-3-5-sonnet-latest".to_string(),
            max_tokens: 4096,
            request_timeout_secs: 120,
        }
    }
}

/// Remote analytical query engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Database the statements run against.
    pub database: String,
    /// Where the engine writes result files.
    pub output_location: String,
    /// Delay between status polls.
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    /// Schema advertised to the SQL generator.
    pub tables: Vec<TableSchema>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8900".to_string(),
            api_key: None,
            database: "se_report_db".to_string(),
            output_location: "s3://adsight-query-results/".to_string(),
            poll_interval_ms: 500,
            request_timeout_secs: 30,
            tables: vec![TableSchema::ad_performance()],
        }
    }
}

/// One queryable warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Fully qualified table name.
    pub name: String,
    /// Partition columns; every query must constrain them.
    #[serde(default)]
    pub partition_columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Daily ad performance table, partitioned by platform and date parts.
    pub fn ad_performance() -> Self {
        let col = |name: &str, ty: &str| ColumnSchema {
            name: name.to_string(),
            data_type: ty.to_string(),
        };
        Self {
            name: "se_report_db.se_ad_performance_parquet".to_string(),
            partition_columns: vec![
                col("platform", "string"),
                col("year", "string"),
                col("month", "string"),
                col("day", "string"),
            ],
            columns: vec![
                col("date", "string"),
                col("campaign_id", "string"),
                col("campaign_name", "string"),
                col("ad_group_id", "string"),
                col("ad_group_name", "string"),
                col("impressions", "bigint"),
                col("clicks", "bigint"),
                col("cost", "double"),
                col("conversions", "bigint"),
                col("conversion_value", "double"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

/// Chat turn behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of prior messages given to the generators.
    pub history_limit: usize,
    /// Look-back window used when a question names no dates.
    pub default_lookback_days: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            default_lookback_days: 30,
        }
    }
}
