use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::Path;
use crate::error::ConfigError;
use crate::models::registry::{is_valid_address, normalize_address};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub polling: PollingConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
    pub chains: Vec<ChainConfig>,
}

/// Chain client configuration shared by all chains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Block polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Wait before re-requesting a block the chain has not produced yet
    pub not_found_delay_seconds: u64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path
    pub path: String,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable HTTP API server
    pub enabled: bool,
    /// Server port
    pub port: u16,
    /// Server host/bind address
    pub host: String,
}

/// Telegram notification configuration.
///
/// Secrets normally come from `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub telegram_api_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Resolved Telegram secrets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramCredentials {
    pub bot_token: String,
    pub chat_id: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

/// One tracked chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Label used in events, logs and env overrides
    pub name: String,
    pub rpc_url: String,
    pub native_symbol: String,
    pub start_block: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_address: Option<String>,
    pub tracked_addresses: Vec<String>,
    pub tracked_tokens: Vec<String>,
    /// Trust the node-reported sender for transaction types without a known signing scheme
    pub reported_sender_fallback: bool,
    /// Per-token overrides keyed by contract address
    pub tokens: BTreeMap<String, TokenConfig>,
}

/// Per-token display and decimals override
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { not_found_delay_seconds: 12 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./tracker.db".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            telegram_api_url: "https://api.telegram.org".to_string(),
            bot_token: None,
            chat_id: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl NotificationConfig {
    /// Both secrets must be present and non-blank
    pub fn credentials(&self) -> Result<TelegramCredentials, ConfigError> {
        let bot_token = non_blank(&self.bot_token)
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))?;
        let chat_id = non_blank(&self.chat_id)
            .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_CHAT_ID".to_string()))?;
        Ok(TelegramCredentials { bot_token, chat_id })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl ChainConfig {
    /// `tracked_address` and `tracked_addresses` merged
    pub fn all_tracked_addresses(&self) -> Vec<String> {
        self.tracked_address
            .iter()
            .chain(self.tracked_addresses.iter())
            .filter(|a| !a.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Decimals per normalized token address, only for tokens that override them
    pub fn token_decimals(&self) -> HashMap<String, u8> {
        self.tokens
            .iter()
            .filter_map(|(address, token)| {
                token.decimals.map(|d| (normalize_address(address), d))
            })
            .collect()
    }

    /// Display symbol per normalized token address
    pub fn symbol_overrides(&self) -> HashMap<String, String> {
        self.tokens
            .iter()
            .filter_map(|(address, token)| {
                token
                    .symbol
                    .as_ref()
                    .filter(|s| !s.trim().is_empty())
                    .map(|s| (normalize_address(address), s.clone()))
            })
            .collect()
    }

    /// Environment variable overriding this chain's RPC URL, e.g. `POLYGON_RPC_URL`
    pub fn rpc_url_env_key(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_RPC_URL", name)
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    /// Environment variables take precedence over file values
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file() -> Result<Self, ConfigError> {
        let config_path = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if !Path::new(&config_path).exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ConfigError::FileNotFound(config_path.clone()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parsing(e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(timeout) = parse_env::<u64>("RPC_TIMEOUT_SECONDS")? {
            self.rpc.timeout_seconds = timeout;
        }
        if let Some(delay) = parse_env::<u64>("NOT_FOUND_DELAY_SECONDS")? {
            self.polling.not_found_delay_seconds = delay;
        }

        // Database configuration
        if let Ok(path) = env::var("DATABASE_PATH") {
            self.database.path = path;
        }

        // API configuration
        if let Some(enabled) = parse_env::<bool>("API_ENABLED")? {
            self.api.enabled = enabled;
        }
        if let Some(port) = parse_env::<u16>("API_PORT")? {
            self.api.port = port;
        }
        if let Ok(host) = env::var("API_HOST") {
            self.api.host = host;
        }

        // Notification secrets
        if let Ok(token) = env::var("TELEGRAM_BOT_TOKEN") {
            self.notification.bot_token = Some(token);
        }
        if let Ok(chat_id) = env::var("TELEGRAM_CHAT_ID") {
            self.notification.chat_id = Some(chat_id);
        }

        // Logging configuration
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("LOG_FORMAT") {
            self.logging.format = format;
        }

        for chain in &mut self.chains {
            if let Ok(url) = env::var(chain.rpc_url_env_key()) {
                chain.rpc_url = url;
            }
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.timeout_seconds == 0 || self.rpc.timeout_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "rpc.timeout_seconds".to_string(),
                value: self.rpc.timeout_seconds.to_string(),
            });
        }

        if self.polling.not_found_delay_seconds == 0 || self.polling.not_found_delay_seconds > 300 {
            return Err(ConfigError::InvalidValue {
                key: "polling.not_found_delay_seconds".to_string(),
                value: self.polling.not_found_delay_seconds.to_string(),
            });
        }

        if self.api.port == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.port".to_string(),
                value: self.api.port.to_string(),
            });
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                value: self.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.format".to_string(),
                value: self.logging.format.clone(),
            });
        }

        if self.database.path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "database.path".to_string(),
                value: self.database.path.clone(),
            });
        }

        if !is_http_url(&self.notification.telegram_api_url) {
            return Err(ConfigError::InvalidUrl(self.notification.telegram_api_url.clone()));
        }

        if self.chains.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chains".to_string(),
                value: "no chain configured".to_string(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        for chain in &self.chains {
            chain.validate()?;
            if !seen.insert(chain.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: "chains.name".to_string(),
                    value: chain.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample_config() -> Result<String, ConfigError> {
        let mut tokens = BTreeMap::new();
        tokens.insert(
            "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(),
            TokenConfig {
                name: "Tether USD".to_string(),
                symbol: Some("USDT".to_string()),
                decimals: Some(6),
            },
        );

        let config = Self {
            chains: vec![ChainConfig {
                name: "ethereum".to_string(),
                rpc_url: "https://eth.llamarpc.com".to_string(),
                native_symbol: "ETH".to_string(),
                start_block: 19_000_000,
                tracked_address: None,
                tracked_addresses: vec!["0xf977814e90da44bfa03b6295a0616a897441acec".to_string()],
                tracked_tokens: vec!["0xdac17f958d2ee523a2206206994597c13d831ec7".to_string()],
                reported_sender_fallback: false,
                tokens,
            }],
            ..Self::default()
        };
        toml::to_string_pretty(&config)
            .map_err(|e| ConfigError::Parsing(e.to_string()))
    }
}

impl ChainConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "chains.name".to_string(),
                value: self.name.clone(),
            });
        }

        if !is_http_url(&self.rpc_url) {
            return Err(ConfigError::InvalidUrl(self.rpc_url.clone()));
        }

        if self.native_symbol.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("chains.{}.native_symbol", self.name),
                value: self.native_symbol.clone(),
            });
        }

        let addresses = self.all_tracked_addresses();
        if addresses.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("chains.{}.tracked_addresses", self.name),
                value: "no tracked address".to_string(),
            });
        }

        let all = addresses
            .iter()
            .map(|a| ("tracked_addresses", a))
            .chain(self.tracked_tokens.iter().map(|t| ("tracked_tokens", t)))
            .chain(self.tokens.keys().map(|k| ("tokens", k)));
        for (field, address) in all {
            if !is_valid_address(address) {
                return Err(ConfigError::InvalidValue {
                    key: format!("chains.{}.{}", self.name, field),
                    value: address.clone(),
                });
            }
        }

        Ok(())
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
