use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::translator::{TranslatorSettings, DEFAULT_FORBIDDEN_MARKER};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translator configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
#[validate(schema(function = "validate_limits"))]
pub struct TranslatorConfig {
    /// Schema definition file
    #[validate(length(min = 1, message = "Schema path cannot be empty"))]
    pub schema_path: String,

    /// Page size for top-level lists of types that declare no default
    #[validate(range(min = 1, message = "Default limit must be at least 1"))]
    pub default_limit: Option<u64>,

    /// Ceiling for every requested page size
    #[validate(range(min = 1, message = "Max limit must be at least 1"))]
    pub max_limit: Option<u64>,

    /// Embed a filter/sort signature in connection cursors
    pub cursor_signing: bool,

    /// Message raised by failed validate-mode authorization rules
    #[validate(length(min = 1, message = "Forbidden marker cannot be empty"))]
    pub forbidden_marker: String,

    /// Store call timeout in milliseconds
    #[validate(range(
        min = 1,
        max = 3_600_000,
        message = "Query timeout must be between 1ms and one hour"
    ))]
    pub query_timeout_ms: Option<u64>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            schema_path: "schema.yaml".to_string(),
            default_limit: None,
            max_limit: None,
            cursor_signing: true,
            forbidden_marker: DEFAULT_FORBIDDEN_MARKER.to_string(),
            query_timeout_ms: None,
        }
    }
}

fn validate_limits(config: &TranslatorConfig) -> Result<(), ValidationError> {
    match (config.default_limit, config.max_limit) {
        (Some(default), Some(max)) if default > max => {
            let mut err = ValidationError::new("default_limit_exceeds_max");
            err.message = Some("Default limit cannot exceed max limit".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

impl TranslatorConfig {
    /// Create configuration from environment variables (and `.env`) with
    /// validation
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            schema_path: env::var("CYPHERQL_SCHEMA_PATH").unwrap_or(defaults.schema_path),
            default_limit: parse_optional_env_var("CYPHERQL_DEFAULT_LIMIT")?,
            max_limit: parse_optional_env_var("CYPHERQL_MAX_LIMIT")?,
            cursor_signing: parse_env_var("CYPHERQL_CURSOR_SIGNING", "true")?,
            forbidden_marker: env::var("CYPHERQL_FORBIDDEN_MARKER")
                .unwrap_or(defaults.forbidden_marker),
            query_timeout_ms: parse_optional_env_var("CYPHERQL_QUERY_TIMEOUT_MS")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file; missing keys take defaults
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Merge with another configuration (the later source wins)
    pub fn merge(&mut self, other: Self) {
        self.schema_path = other.schema_path;
        self.default_limit = other.default_limit.or(self.default_limit);
        self.max_limit = other.max_limit.or(self.max_limit);
        self.cursor_signing = other.cursor_signing;
        self.forbidden_marker = other.forbidden_marker;
        self.query_timeout_ms = other.query_timeout_ms.or(self.query_timeout_ms);
    }

    /// Apply command line overrides, then validate
    pub fn apply_cli(mut self, cli: CliConfig) -> Result<Self, ConfigError> {
        if let Some(path) = cli.schema_path {
            self.schema_path = path;
        }
        if cli.default_limit.is_some() {
            self.default_limit = cli.default_limit;
        }
        if cli.max_limit.is_some() {
            self.max_limit = cli.max_limit;
        }
        if cli.unsigned_cursors {
            self.cursor_signing = false;
        }

        self.validate()?;
        Ok(self)
    }

    /// Compiler knobs derived from this configuration
    pub fn settings(&self) -> TranslatorSettings {
        TranslatorSettings {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
            cursor_signing: self.cursor_signing,
            forbidden_marker: self.forbidden_marker.clone(),
        }
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub schema_path: Option<String>,
    pub default_limit: Option<u64>,
    pub max_limit: Option<u64>,
    pub unsigned_cursors: bool,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

/// Parse an environment variable that may be unset
fn parse_optional_env_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|e| ConfigError::Parse {
            field: key.to_string(),
            value,
            source: Box::new(e),
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
