//! Shared types for drsync: configuration, the canonical order record, the
//! field mapping / target schema pair, and the diagnostics sink.

pub mod app_config;
pub mod config;
pub mod diagnostics;
pub mod fields;
pub mod records;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, SourceConfig, StoreConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, FileDiagnosticSink, MemorySink};
pub use fields::{CanonicalField, FieldMapping, FieldRule, TargetSchema};
pub use records::{parse_iso_date, CanonicalRecord};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read field map {path}: {source}")]
    FieldMapIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse field map: {0}")]
    FieldMapParse(#[from] serde_yaml::Error),
}
