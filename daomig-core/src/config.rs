//! Per-network YAML configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.daomig/
//!   config.yaml        (networks, mode 0600)
//!   migration.json     (deployment record, see daomig-ledger)
//!   state/<network>.json
//! ```
//!
//! # API pattern
//!
//! Every function touching the filesystem has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_FOUNDERS_BATCH, DEFAULT_INITIAL_FOUNDERS_BATCH,
    DEFAULT_POLL_INTERVAL_MS,
};
use crate::error::ConfigError;
use crate::types::{Address, ContractName, NetworkKey, PackageVersion};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Founder batch sizes; tuned per network to stay under gas limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Founders included in the instance-creation transaction.
    pub initial_founders: usize,
    /// Founders per follow-up `addFounders` transaction.
    pub founders: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            initial_founders: DEFAULT_INITIAL_FOUNDERS_BATCH,
            founders: DEFAULT_FOUNDERS_BATCH,
        }
    }
}

/// Everything needed to talk to and deploy on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    /// Node-managed account that signs every transaction.
    pub deployer: Address,
    pub package_version: PackageVersion,
    /// Development chains deploy their own base token.
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub batches: BatchConfig,
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Package contracts that already exist and must never be deployed,
    /// e.g. the public GEN token.
    #[serde(default)]
    pub pinned_contracts: BTreeMap<ContractName, Address>,
}

fn default_confirmation_timeout() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT_SECS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl NetworkConfig {
    pub fn new(rpc_url: impl Into<String>, deployer: Address, package_version: PackageVersion) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            deployer,
            package_version,
            private: false,
            batches: BatchConfig::default(),
            confirmation_timeout_secs: DEFAULT_CONFIRMATION_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            pinned_contracts: BTreeMap::new(),
        }
    }

    pub fn validate(&self, network: &NetworkKey) -> Result<(), ConfigError> {
        if self.batches.initial_founders == 0 {
            return Err(ConfigError::invalid(
                format!("networks.{network}.batches.initial_founders"),
                "must be at least 1",
            ));
        }
        if self.batches.founders == 0 {
            return Err(ConfigError::invalid(
                format!("networks.{network}.batches.founders"),
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DaomigConfig {
    #[serde(default)]
    pub networks: BTreeMap<NetworkKey, NetworkConfig>,
}

impl DaomigConfig {
    pub fn network(&self, key: &NetworkKey) -> Result<&NetworkConfig, ConfigError> {
        let cfg = self
            .networks
            .get(key)
            .ok_or_else(|| ConfigError::NetworkNotFound {
                network: key.0.clone(),
            })?;
        cfg.validate(key)?;
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.daomig/`
pub fn daomig_root(home: &Path) -> PathBuf {
    home.join(".daomig")
}

/// `<home>/.daomig/config.yaml`. Pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    daomig_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the configuration from an explicit file.
///
/// Returns `ConfigError::ConfigNotFound` if absent and
/// `ConfigError::ParseYaml` (with path) if malformed.
pub fn load_config(path: &Path) -> Result<DaomigConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.daomig/config.yaml`.
pub fn load_config_at(home: &Path) -> Result<DaomigConfig, ConfigError> {
    load_config(&config_path_at(home))
}

/// Atomically save the configuration.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_config(path: &Path, config: &DaomigConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Add or replace one network entry, creating the file if needed.
pub fn upsert_network(
    path: &Path,
    key: NetworkKey,
    network: NetworkConfig,
) -> Result<DaomigConfig, ConfigError> {
    let mut config = if path.exists() {
        load_config(path)?
    } else {
        DaomigConfig::default()
    };
    network.validate(&key)?;
    config.networks.insert(key, network);
    save_config(path, &config)?;
    Ok(config)
}

/// `dirs::home_dir()` or `ConfigError::HomeNotFound`.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
