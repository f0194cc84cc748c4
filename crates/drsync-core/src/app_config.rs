use std::net::SocketAddr;
use std::path::PathBuf;

use crate::fields::{FieldMapping, TargetSchema};
use crate::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Connection settings for the DRS site.
#[derive(Clone)]
pub struct SourceConfig {
    pub base_url: String,
    /// Explicit login page, tried before the conventional paths.
    pub login_url: Option<String>,
    pub username: String,
    pub password: String,
    /// Report page holding the daily orders table.
    pub orders_url: String,
    /// JSON endpoint paths probed by the API / relay path, in order.
    pub api_paths: Vec<String>,
    pub api_token: Option<String>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("base_url", &self.base_url)
            .field("login_url", &self.login_url)
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("orders_url", &self.orders_url)
            .field("api_paths", &self.api_paths)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Record store (Airtable) settings.
#[derive(Clone)]
pub struct StoreConfig {
    pub api_key: String,
    pub base_id: String,
    pub table: String,
    pub api_url: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("api_key", &"[redacted]")
            .field("base_id", &self.base_id)
            .field("table", &self.table)
            .field("api_url", &self.api_url)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .finish()
    }
}

/// Immutable process configuration, built once at startup and passed by
/// reference. Sections a command does not need may be absent; ask for them
/// with [`AppConfig::require_source`] / [`AppConfig::require_store`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub diagnostics_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub download_timeout_secs: u64,
    pub export_prefix: String,
    pub relay_bind_addr: SocketAddr,
    pub field_mapping: FieldMapping,
    pub target_schema: TargetSchema,
    pub source: Option<SourceConfig>,
    pub store: Option<StoreConfig>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] naming `DRS_BASE_URL` when the
    /// DRS section was not configured.
    pub fn require_source(&self) -> Result<&SourceConfig, ConfigError> {
        self.source
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DRS_BASE_URL".to_string()))
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] naming `AIRTABLE_API_KEY` when
    /// the store section was not configured.
    pub fn require_store(&self) -> Result<&StoreConfig, ConfigError> {
        self.store
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("AIRTABLE_API_KEY".to_string()))
    }
}
