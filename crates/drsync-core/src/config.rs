use std::net::SocketAddr;
use std::path::PathBuf;

use crate::app_config::{AppConfig, Environment, SourceConfig, StoreConfig};
use crate::fields::{CanonicalField, FieldMapping, TargetSchema};
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_API_PATHS: &str = "/api/orders,/api/baskets";
const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0/";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// All parsing and validation lives here so tests can drive it with a plain
/// `HashMap` lookup instead of mutating the process environment.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let require = |var: &str| -> Result<String, ConfigError> {
        optional(var).ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let env = parse_environment(&or_default("DRSYNC_ENV", "development"))?;
    let log_level = or_default("DRSYNC_LOG_LEVEL", "info");
    let diagnostics_dir = PathBuf::from(or_default("DRSYNC_DIAGNOSTICS_DIR", "./diagnostics"));
    let request_timeout_secs = parse_u64("DRSYNC_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("DRSYNC_USER_AGENT", DEFAULT_USER_AGENT);
    let download_timeout_secs = parse_u64("DRSYNC_DOWNLOAD_TIMEOUT_SECS", "60")?;
    let export_prefix = or_default("DRSYNC_EXPORT_PREFIX", "Orders");

    let relay_bind_addr = or_default("RELAY_BIND_ADDR", "0.0.0.0:8787")
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "RELAY_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;

    let mut field_mapping = match optional("DRSYNC_FIELD_MAP_PATH") {
        Some(path) => FieldMapping::load(&PathBuf::from(path))?,
        None => FieldMapping::default(),
    };
    let mut target_schema = TargetSchema::default();

    for field in CanonicalField::ALL {
        let col_var = format!("DRSYNC_COL_{}", field.env_suffix());
        if let Some(raw) = optional(&col_var) {
            let index = parse_column_index(&col_var, &raw)?;
            field_mapping = field_mapping.with_column_index(field, index);
        }

        let name_var = format!("AIRTABLE_FIELD_{}", field.env_suffix());
        if let Some(name) = optional(&name_var) {
            target_schema.set_display_name(field, name);
        }
    }
    if let Some(name) = optional("AIRTABLE_FIELD_DATE") {
        target_schema.date = name;
    }

    let source = match optional("DRS_BASE_URL") {
        Some(raw_base) => {
            let base_url = raw_base.trim_end_matches('/').to_string();
            let api_paths = parse_api_paths(&or_default("DRS_API_PATHS", DEFAULT_API_PATHS));
            Some(SourceConfig {
                login_url: optional("DRS_LOGIN_URL"),
                username: require("DRS_USERNAME")?,
                password: require("DRS_PASSWORD")?,
                orders_url: optional("DRS_ORDERS_URL")
                    .unwrap_or_else(|| format!("{base_url}/orders")),
                api_paths,
                api_token: optional("DRS_API_TOKEN"),
                base_url,
            })
        }
        None => None,
    };

    let store = match optional("AIRTABLE_API_KEY") {
        Some(api_key) => Some(StoreConfig {
            api_key,
            base_id: require("AIRTABLE_BASE_ID")?,
            table: require("AIRTABLE_TABLE")?,
            api_url: or_default("AIRTABLE_API_URL", DEFAULT_AIRTABLE_API_URL),
            max_retries: parse_u32("DRSYNC_STORE_MAX_RETRIES", "3")?,
            backoff_base_ms: parse_u64("DRSYNC_STORE_BACKOFF_BASE_MS", "1000")?,
        }),
        None => None,
    };

    Ok(AppConfig {
        env,
        log_level,
        diagnostics_dir,
        request_timeout_secs,
        user_agent,
        download_timeout_secs,
        export_prefix,
        relay_bind_addr,
        field_mapping,
        target_schema,
        source,
        store,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "DRSYNC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

/// Column overrides are 1-based so they line up with `col<N>` labels.
fn parse_column_index(var: &str, raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(0) => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: "column indexes start at 1".to_string(),
        }),
        Ok(index) => Ok(index),
        Err(e) => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_api_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.starts_with('/') {
                p.to_string()
            } else {
                format!("/{p}")
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
