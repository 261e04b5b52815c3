//! Error types for daomig-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to parse one of the hex/decimal domain newtypes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("expected 0x-prefixed hex, got '{0}'")]
    MissingPrefix(String),

    #[error("invalid hex '{value}': {reason}")]
    InvalidHex { value: String, reason: String },

    #[error("expected {expected} bytes, got {found}")]
    WrongLength { expected: usize, found: usize },

    #[error("invalid permission mask '{0}'; expected 0x followed by 8 hex digits")]
    PermissionMask(String),

    #[error("invalid amount '{value}': {reason}")]
    Amount { value: String, reason: String },
}

/// All errors that can arise from loading configuration or parameter documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.daomig/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The configuration file did not exist at the expected path.
    #[error("configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// The requested network has no entry in the configuration.
    #[error("network '{network}' is not configured")]
    NetworkNotFound { network: String },

    /// A field of the parameter document or configuration is unusable.
    #[error("invalid configuration at `{field}`: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
