//! The persisted deployment record (`migration.json`).
//!
//! Keyed by network, then by package version:
//!
//! ```text
//! {
//!   "<network>": {
//!     "base": { "<version>": { "<ContractName>": { "address": .., "dependencies": [..] } } },
//!     "dao":  { "<version>": { "name": .., "Avatar": .., "DAOToken": .., .. } }
//!   }
//! }
//! ```
//!
//! Older records stored base entries as bare address strings; those load with
//! unknown dependencies.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use daomig_core::config::daomig_root;
use daomig_core::{Address, Bytes32, ContractName, NetworkKey, PackageVersion};

use crate::error::{io_err, LedgerError};
use crate::store::write_atomic;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A recorded base contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BaseEntryCompat")]
pub struct BaseEntry {
    pub address: Address,
    /// Addresses passed as constructor dependencies, in order. `None` when the
    /// entry predates dependency tracking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<Address>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BaseEntryCompat {
    Structured {
        address: Address,
        #[serde(default)]
        dependencies: Option<Vec<Address>>,
    },
    Legacy(Address),
}

impl From<BaseEntryCompat> for BaseEntry {
    fn from(c: BaseEntryCompat) -> Self {
        match c {
            BaseEntryCompat::Structured { address, dependencies } => Self { address, dependencies },
            BaseEntryCompat::Legacy(address) => Self {
                address,
                dependencies: None,
            },
        }
    }
}

impl BaseEntry {
    pub fn new(address: Address, dependencies: Vec<Address>) -> Self {
        Self {
            address,
            dependencies: Some(dependencies),
        }
    }

    /// Unknown dependencies only match a contract that has none.
    pub fn dependencies_match(&self, expected: &[Address]) -> bool {
        match &self.dependencies {
            Some(deps) => deps.as_slice() == expected,
            None => expected.is_empty(),
        }
    }
}

/// A name/alias/address triple for installed modules and stand-alone contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedAddress {
    pub name: ContractName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub address: Address,
}

/// Final identity of one created organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoRecord {
    pub name: String,
    #[serde(rename = "Avatar")]
    pub avatar: Address,
    #[serde(rename = "DAOToken")]
    pub dao_token: Address,
    #[serde(rename = "Reputation")]
    pub reputation: Address,
    #[serde(rename = "Controller")]
    pub controller: Address,
    #[serde(rename = "Schemes", default)]
    pub schemes: Vec<NamedAddress>,
    #[serde(rename = "StandAloneContracts", default)]
    pub stand_alone: Vec<NamedAddress>,
    #[serde(rename = "VotingParams", default)]
    pub voting_params: Vec<Bytes32>,
}

/// Everything recorded for one network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkRecord {
    #[serde(default)]
    pub base: BTreeMap<PackageVersion, BTreeMap<ContractName, BaseEntry>>,
    #[serde(default)]
    pub dao: BTreeMap<PackageVersion, DaoRecord>,
}

/// Root of `migration.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationRecord(pub BTreeMap<NetworkKey, NetworkRecord>);

impl MigrationRecord {
    pub fn network(&self, network: &NetworkKey) -> Option<&NetworkRecord> {
        self.0.get(network)
    }

    fn network_mut(&mut self, network: &NetworkKey) -> &mut NetworkRecord {
        self.0.entry(network.clone()).or_default()
    }

    /// Prior deployments of `name`: `version` first, then every other recorded
    /// version in descending key order.
    pub fn base_candidates(
        &self,
        network: &NetworkKey,
        version: &PackageVersion,
        name: &ContractName,
    ) -> Vec<(PackageVersion, BaseEntry)> {
        let Some(net) = self.network(network) else {
            return Vec::new();
        };
        let current = net
            .base
            .get(version)
            .and_then(|entries| entries.get(name))
            .map(|e| (version.clone(), e.clone()));
        let others = net
            .base
            .iter()
            .rev()
            .filter(|(v, _)| *v != version)
            .filter_map(|(v, entries)| entries.get(name).map(|e| (v.clone(), e.clone())));
        current.into_iter().chain(others).collect()
    }

    /// Merge base entries for `version`; existing names are overwritten.
    pub fn record_base(
        &mut self,
        network: &NetworkKey,
        version: &PackageVersion,
        entries: impl IntoIterator<Item = (ContractName, BaseEntry)>,
    ) {
        self.network_mut(network)
            .base
            .entry(version.clone())
            .or_default()
            .extend(entries);
    }

    pub fn dao(&self, network: &NetworkKey, version: &PackageVersion) -> Option<&DaoRecord> {
        self.network(network).and_then(|n| n.dao.get(version))
    }

    pub fn record_dao(&mut self, network: &NetworkKey, version: &PackageVersion, dao: DaoRecord) {
        self.network_mut(network).dao.insert(version.clone(), dao);
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// `<home>/.daomig/migration.json`
pub fn record_path_at(home: &Path) -> PathBuf {
    daomig_root(home).join("migration.json")
}

/// Load the record at `path`; a missing file is an empty record.
pub fn load_record(path: &Path) -> Result<MigrationRecord, LedgerError> {
    if !path.exists() {
        return Ok(MigrationRecord::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_json::from_str(&contents).map_err(|source| LedgerError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_record(path: &Path, record: &MigrationRecord) -> Result<(), LedgerError> {
    let json = serde_json::to_string_pretty(record)?;
    write_atomic(path, json.as_bytes())
}
