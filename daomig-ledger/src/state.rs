//! `DeploymentState`: the durable progress record of one migration run.
//!
//! Every field that gates a step is either a write-once value (set through a
//! `set_*` method that refuses to change it) or a monotonic [`Counter`].
//! Nothing here talks to the network; the orchestrator mutates the state and
//! saves it through [`crate::store`] after each confirmed effect.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use daomig_core::{
    Address, Bytes, Bytes32, ContractName, DeploymentMode, NetworkKey, PackageVersion,
    PermissionMask,
};

use crate::error::LedgerError;

/// Bumped whenever the on-disk layout changes incompatibly.
pub const STATE_FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Workflow stages in execution order; `stage` in the state is the last one
/// fully completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Started,
    PackageReady,
    InstanceCreated,
    FoundersAdded,
    DaoRegistryRegistered,
    VotingParamsSet,
    StandAloneDeployed,
    ModulesDescribed,
    ModulesRegistered,
    PostRegistrationHooks,
    Finalized,
}

impl Stage {
    pub fn all() -> &'static [Stage] {
        &[
            Stage::Started,
            Stage::PackageReady,
            Stage::InstanceCreated,
            Stage::FoundersAdded,
            Stage::DaoRegistryRegistered,
            Stage::VotingParamsSet,
            Stage::StandAloneDeployed,
            Stage::ModulesDescribed,
            Stage::ModulesRegistered,
            Stage::PostRegistrationHooks,
            Stage::Finalized,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Started => "started",
            Stage::PackageReady => "package ready",
            Stage::InstanceCreated => "instance created",
            Stage::FoundersAdded => "founders added",
            Stage::DaoRegistryRegistered => "registry registered",
            Stage::VotingParamsSet => "voting params set",
            Stage::StandAloneDeployed => "stand-alone deployed",
            Stage::ModulesDescribed => "modules described",
            Stage::ModulesRegistered => "modules registered",
            Stage::PostRegistrationHooks => "post-registration hooks",
            Stage::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Progress records
// ---------------------------------------------------------------------------

/// Monotonic count of confirmed steps within a stage.
///
/// Step `n` (zero-based) is done iff the counter is greater than `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counter(usize);

impl Counter {
    pub fn get(&self) -> usize {
        self.0
    }

    pub fn is_done(&self, step: usize) -> bool {
        self.0 > step
    }

    /// Mark the next step done; returns the new count.
    pub fn advance(&mut self) -> usize {
        self.0 += 1;
        self.0
    }
}

/// Partial completion of the batched founder registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FoundersProgress {
    /// All founders in the parameter document.
    pub total: usize,
    /// Founders already registered on chain, counted from the front of the list.
    pub added: usize,
    pub batches_completed: usize,
}

impl FoundersProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            added: 0,
            batches_completed: 0,
        }
    }

    /// Founders still waiting for a batch.
    pub fn total_to_add(&self) -> usize {
        self.total.saturating_sub(self.added)
    }

    /// Record one confirmed batch of `size` founders.
    pub fn record_batch(&mut self, size: usize) {
        self.added = (self.added + size).min(self.total);
        self.batches_completed += 1;
    }
}

/// Per-step progress of the one-contract-at-a-time instance creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualInstanceProgress {
    /// Confirmed founder mint transactions.
    pub mints: Counter,
    /// Confirmed ownership transfers (avatar, reputation, token).
    pub ownership_transfers: Counter,
    pub universal_controller_registered: bool,
}

/// A stand-alone contract, appended once its deployment is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandAloneRecord {
    pub name: ContractName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub address: Address,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub hooks: Counter,
}

/// A described module; addresses and flags fill in as registration proceeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRegistration {
    pub name: ContractName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// ABI calldata of the module's initializer.
    pub encoded_params: Bytes,
    pub permissions: PermissionMask,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Universal modules only: the hash `setParameters` returned, recorded
    /// before the call is sent and registered alongside the module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_hash: Option<Bytes32>,
    #[serde(default)]
    pub initialized: bool,
    #[serde(default)]
    pub registered: bool,
}

// ---------------------------------------------------------------------------
// DeploymentState
// ---------------------------------------------------------------------------

/// Durable record of workflow progress for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub format: u32,
    pub network: NetworkKey,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_version: Option<PackageVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<DeploymentMode>,
    /// SHA-256 of the parameter document this run was started with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params_digest: Option<String>,
    /// Deployer transaction count observed after the last persisted step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_nonce: Option<u64>,

    #[serde(default)]
    pub base_addresses: std::collections::BTreeMap<ContractName, Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_address: Option<Address>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founders: Option<FoundersProgress>,
    #[serde(default)]
    pub manual_instance: ManualInstanceProgress,
    #[serde(default)]
    pub registry_steps: Counter,
    #[serde(default)]
    pub voting_params_hashes: Vec<Bytes32>,
    #[serde(default)]
    pub stand_alone: Vec<StandAloneRecord>,
    #[serde(default)]
    pub module_registrations: Vec<ModuleRegistration>,
    #[serde(default)]
    pub modules_finalized: bool,
    #[serde(default)]
    pub post_hooks: Counter,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn set_once<T>(slot: &mut Option<T>, field: &'static str, value: T) -> Result<(), LedgerError>
where
    T: PartialEq + fmt::Display,
{
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(existing) => Err(LedgerError::ImmutableField {
            field,
            existing: existing.to_string(),
            attempted: value.to_string(),
        }),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}

impl DeploymentState {
    /// A fresh state with no progress.
    pub fn empty(network: NetworkKey) -> Self {
        let now = Utc::now();
        Self {
            format: STATE_FORMAT_VERSION,
            network,
            stage: Stage::Started,
            organization_name: None,
            package_version: None,
            mode: None,
            params_digest: None,
            account_nonce: None,
            base_addresses: Default::default(),
            application_address: None,
            token_address: None,
            reputation_address: None,
            controller_address: None,
            founders: None,
            manual_instance: ManualInstanceProgress::default(),
            registry_steps: Counter::default(),
            voting_params_hashes: Vec::new(),
            stand_alone: Vec::new(),
            module_registrations: Vec::new(),
            modules_finalized: false,
            post_hooks: Counter::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when no step of any stage has been recorded.
    pub fn is_fresh(&self) -> bool {
        self.stage == Stage::Started
            && self.base_addresses.is_empty()
            && self.application_address.is_none()
            && self.token_address.is_none()
    }

    /// Record a completed stage. Never moves backwards.
    pub fn complete_stage(&mut self, stage: Stage) {
        if stage > self.stage {
            self.stage = stage;
        }
    }

    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        self.stage >= stage
    }

    pub fn set_organization_name(&mut self, name: &str) -> Result<(), LedgerError> {
        set_once(&mut self.organization_name, "organization_name", name.to_owned())
    }

    pub fn set_package_version(&mut self, version: &PackageVersion) -> Result<(), LedgerError> {
        set_once(&mut self.package_version, "package_version", version.clone())
    }

    pub fn set_mode(&mut self, mode: DeploymentMode) -> Result<(), LedgerError> {
        match self.mode {
            Some(existing) if existing != mode => Err(LedgerError::ImmutableField {
                field: "mode",
                existing: format!("{existing:?}"),
                attempted: format!("{mode:?}"),
            }),
            _ => {
                self.mode = Some(mode);
                Ok(())
            }
        }
    }

    pub fn set_application_address(&mut self, address: Address) -> Result<(), LedgerError> {
        set_once(&mut self.application_address, "application_address", address)
    }

    pub fn set_token_address(&mut self, address: Address) -> Result<(), LedgerError> {
        set_once(&mut self.token_address, "token_address", address)
    }

    pub fn set_reputation_address(&mut self, address: Address) -> Result<(), LedgerError> {
        set_once(&mut self.reputation_address, "reputation_address", address)
    }

    pub fn set_controller_address(&mut self, address: Address) -> Result<(), LedgerError> {
        set_once(&mut self.controller_address, "controller_address", address)
    }

    /// Record a base contract address; an existing entry is never replaced.
    pub fn set_base_address(&mut self, name: ContractName, address: Address) -> Result<(), LedgerError> {
        match self.base_addresses.get(&name) {
            Some(existing) if *existing != address => Err(LedgerError::ImmutableField {
                field: "base_addresses",
                existing: format!("{name}={existing}"),
                attempted: format!("{name}={address}"),
            }),
            _ => {
                self.base_addresses.insert(name, address);
                Ok(())
            }
        }
    }

    /// Append the hash for the next voting parameter set.
    pub fn push_voting_params_hash(&mut self, hash: Bytes32) {
        self.voting_params_hashes.push(hash);
    }

    pub fn push_stand_alone(&mut self, record: StandAloneRecord) {
        self.stand_alone.push(record);
    }

    pub fn push_module(&mut self, registration: ModuleRegistration) {
        self.module_registrations.push(registration);
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Snapshot of every monotonic quantity, for comparing two states.
    pub fn progress_vector(&self) -> Vec<usize> {
        let founders = self.founders.map(|f| (f.added, f.batches_completed)).unwrap_or((0, 0));
        vec![
            self.stage as usize,
            self.base_addresses.len(),
            usize::from(self.application_address.is_some()),
            founders.0,
            founders.1,
            self.manual_instance.mints.get(),
            self.manual_instance.ownership_transfers.get(),
            self.registry_steps.get(),
            self.voting_params_hashes.len(),
            self.stand_alone.len(),
            self.stand_alone.iter().map(|s| s.hooks.get() + usize::from(s.initialized)).sum(),
            self.module_registrations.len(),
            self.module_registrations
                .iter()
                .map(|m| {
                    usize::from(m.address.is_some())
                        + usize::from(m.params_hash.is_some())
                        + usize::from(m.initialized)
                        + usize::from(m.registered)
                })
                .sum(),
            usize::from(self.modules_finalized),
            self.post_hooks.get(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
