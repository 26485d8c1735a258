use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8890";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_GENERATION_BASE_URL: &str = gemini_client::DEFAULT_BASE_URL;
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_RECYCLE_RETENTION_DAYS: i64 = 90;
const DEFAULT_GIFT_CODE_PREFIX: &str = "SD";

/// Keys that match this value are build placeholders, never real credentials.
const PLACEHOLDER_API_KEY: &str = "DUMMY_KEY_FOR_BUILD";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub store_path: Option<PathBuf>,
    pub admin_token: Option<String>,
    pub backup_api_key: Option<String>,
    pub env_api_key: Option<String>,
    pub generation_base_url: String,
    pub default_model: String,
    pub recycle_retention_days: i64,
    pub gift_code_prefix: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid SD_BIND_ADDR value '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("SD_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|source| ConfigError::InvalidBindAddr {
                value: bind_addr_raw,
                source,
            })?;

        let log_filter = env::var("SD_LOG_FILTER")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let store_path = env::var("SD_STORE_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let admin_token = env::var("SD_ADMIN_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let backup_api_key = env::var("SD_BACKUP_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && value != PLACEHOLDER_API_KEY);

        let env_api_key = env::var("GEMINI_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty() && value != PLACEHOLDER_API_KEY);

        let generation_base_url = env::var("SD_GENERATION_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GENERATION_BASE_URL.to_string());

        let default_model = env::var("SD_DEFAULT_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let recycle_retention_days = env::var("SD_RECYCLE_RETENTION_DAYS")
            .ok()
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(DEFAULT_RECYCLE_RETENTION_DAYS)
            .max(1);

        let gift_code_prefix = env::var("SD_GIFT_CODE_PREFIX")
            .ok()
            .map(|value| value.trim().to_uppercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_GIFT_CODE_PREFIX.to_string());

        Ok(Self {
            bind_addr,
            log_filter,
            store_path,
            admin_token,
            backup_api_key,
            env_api_key,
            generation_base_url,
            default_model,
            recycle_retention_days,
            gift_code_prefix,
        })
    }
}

#[cfg(test)]
impl Config {
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: "debug".to_string(),
            store_path: None,
            admin_token: Some("admin-test-token".to_string()),
            backup_api_key: None,
            env_api_key: None,
            generation_base_url: DEFAULT_GENERATION_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            recycle_retention_days: DEFAULT_RECYCLE_RETENTION_DAYS,
            gift_code_prefix: DEFAULT_GIFT_CODE_PREFIX.to_string(),
        }
    }
}
