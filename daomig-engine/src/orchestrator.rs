//! Deployment Orchestrator: drives the migration workflow stage by stage.
//!
//! All run-wide data lives in [`MigrationContext`], which every stage function
//! receives explicitly. Each confirmed on-chain effect is followed by a state
//! save before anything depends on it.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use daomig_core::{Address, Bytes, ConfigError, ContractName, ContractRef, MigrationParams, NetworkConfig, NetworkKey};
use daomig_ledger::record::{load_record, save_record};
use daomig_ledger::{store, DaoRecord, DeploymentState, MigrationRecord, NamedAddress, RunLock, Stage};

use crate::abi::{self, token_address, Token};
use crate::artifacts::{Artifact, ArtifactRegistry};
use crate::base::{artifact_for, names, well_known_artifact};
use crate::error::{AbiError, MigrateError};
use crate::gateway::{LedgerGateway, Receipt};
use crate::preflight;
use crate::refs::ResolveContext;
use crate::resolver::ReusePolicy;
use crate::stages;

/// Operator switches for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    pub reuse: ReusePolicy,
    /// Continue a saved run even though the parameter document changed.
    pub allow_param_change: bool,
    /// Re-baseline the deployer nonce instead of stopping on unrecorded transactions.
    pub accept_unrecorded_nonce: bool,
    /// Keep the state file after finalization.
    pub keep_state: bool,
}

/// Everything a run reads but never changes.
#[derive(Debug, Clone, Copy)]
pub struct MigrationInputs<'a> {
    pub network_key: &'a NetworkKey,
    pub network: &'a NetworkConfig,
    pub params: &'a MigrationParams,
    pub artifacts: &'a ArtifactRegistry,
    /// Home directory holding `.daomig/state/`.
    pub home: &'a Path,
    pub record_path: &'a Path,
}

/// Run-wide context passed to every stage.
pub struct MigrationContext<'a, G: LedgerGateway> {
    pub(crate) gateway: &'a mut G,
    pub(crate) artifacts: &'a ArtifactRegistry,
    pub(crate) params: &'a MigrationParams,
    pub(crate) network: &'a NetworkConfig,
    pub(crate) network_key: NetworkKey,
    pub(crate) options: MigrationOptions,
    pub(crate) state: DeploymentState,
    pub(crate) record: MigrationRecord,
    home: PathBuf,
    record_path: PathBuf,
    /// Deployer transaction count after the last confirmed submission.
    nonce: u64,
    _lock: RunLock,
}

impl<'a, G: LedgerGateway> MigrationContext<'a, G> {
    /// Validate inputs, take the run lock and load (or create) the state.
    ///
    /// Fails before any transaction when the parameters are invalid or name
    /// contracts and methods the artifacts lack, when the package version is
    /// unavailable or the parameter document changed, and when the deployer
    /// has sent transactions the state does not account for.
    pub fn open(
        gateway: &'a mut G,
        inputs: MigrationInputs<'a>,
        options: MigrationOptions,
    ) -> Result<Self, MigrateError> {
        let MigrationInputs {
            network_key,
            network,
            params,
            artifacts,
            home,
            record_path,
        } = inputs;

        params.validate()?;
        network.validate(network_key)?;
        if artifacts.version() != &network.package_version {
            return Err(MigrateError::Precondition(format!(
                "artifacts are for package {} but network {network_key} is configured for {}",
                artifacts.version(),
                network.package_version
            )));
        }
        preflight::check(params, artifacts)?;

        let lock = RunLock::acquire_at(home, network_key)?;
        let mut state = store::load_at(home, network_key)?;
        let record = load_record(record_path)?;
        if state.is_fresh() {
            info!(network = %network_key, "starting a new migration");
        } else {
            info!(network = %network_key, stage = %state.stage, "resuming saved migration");
        }

        let digest = params.digest()?;
        match &state.params_digest {
            Some(recorded) if *recorded != digest => {
                if !options.allow_param_change {
                    return Err(MigrateError::ParamsChanged {
                        recorded: recorded.clone(),
                        current: digest,
                    });
                }
                warn!("parameter document changed since the run started; continuing as requested");
                state.params_digest = Some(digest);
            }
            Some(_) => {}
            None => state.params_digest = Some(digest),
        }
        state.set_organization_name(&params.org_name)?;
        state.set_package_version(&network.package_version)?;
        state.set_mode(params.mode)?;

        let on_chain = gateway
            .get_transaction_count(network.deployer)
            .map_err(|e| MigrateError::ledger("read deployer transaction count", e))?;
        if let Some(recorded) = state.account_nonce {
            if recorded != on_chain {
                if !options.accept_unrecorded_nonce {
                    return Err(MigrateError::UnrecordedTransactions { recorded, on_chain });
                }
                warn!(recorded, on_chain, "accepting unrecorded deployer transactions");
            }
        }

        for (i, module) in params.modules.iter().enumerate() {
            let Some(address) = module.address else { continue };
            let code = gateway
                .get_code(address)
                .map_err(|e| MigrateError::ledger(format!("read code of module {}", module.name), e))?;
            if code.is_empty() {
                return Err(ConfigError::invalid(
                    format!("modules[{i}].address"),
                    format!("no contract is deployed at {address}"),
                )
                .into());
            }
        }

        let mut ctx = Self {
            gateway,
            artifacts,
            params,
            network,
            network_key: network_key.clone(),
            options,
            state,
            record,
            home: home.to_path_buf(),
            record_path: record_path.to_path_buf(),
            nonce: on_chain,
            _lock: lock,
        };
        ctx.persist()?;
        Ok(ctx)
    }

    /// Run every remaining stage and return the organization's record.
    pub fn run(&mut self) -> Result<DaoRecord, MigrateError> {
        stages::package_ready(self)?;
        stages::instance_created(self)?;
        stages::founders_added(self)?;
        stages::dao_registry_registered(self)?;
        stages::voting_params_set(self)?;
        stages::stand_alone_deployed(self)?;
        stages::modules_described(self)?;
        stages::modules_registered(self)?;
        stages::post_registration_hooks(self)?;
        self.finalize()
    }

    /// Write the organization into the deployment record.
    ///
    /// Safe to call repeatedly: once finalized it returns the same record
    /// without touching the chain or the record file.
    pub fn finalize(&mut self) -> Result<DaoRecord, MigrateError> {
        let dao = self.build_record()?;
        if self.state.is_stage_complete(Stage::Finalized) {
            debug!("already finalized");
            return Ok(dao);
        }
        if !self.state.is_stage_complete(Stage::PostRegistrationHooks) {
            return Err(MigrateError::Precondition(format!(
                "cannot finalize: last completed stage is {}",
                self.state.stage
            )));
        }
        let version = self.network.package_version.clone();
        self.record.record_dao(&self.network_key, &version, dao.clone());
        self.save_record()?;
        self.state.complete_stage(Stage::Finalized);
        self.persist()?;
        if !self.options.keep_state {
            store::clear_at(&self.home, &self.network_key)?;
        }
        info!(avatar = %dao.avatar, record = %self.record_path.display(), "migration finalized");
        Ok(dao)
    }

    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    pub fn record(&self) -> &MigrationRecord {
        &self.record
    }

    fn build_record(&self) -> Result<DaoRecord, MigrateError> {
        let missing = |what: &str| MigrateError::Precondition(format!("{what} is not recorded yet"));
        let schemes = self
            .state
            .module_registrations
            .iter()
            .map(|m| {
                Ok(NamedAddress {
                    name: m.name.clone(),
                    alias: m.alias.clone(),
                    address: m.address.ok_or_else(|| missing(&format!("module {}", m.name)))?,
                })
            })
            .collect::<Result<Vec<_>, MigrateError>>()?;
        Ok(DaoRecord {
            name: self.params.org_name.clone(),
            avatar: self.state.application_address.ok_or_else(|| missing("avatar"))?,
            dao_token: self.state.token_address.ok_or_else(|| missing("native token"))?,
            reputation: self.state.reputation_address.ok_or_else(|| missing("native reputation"))?,
            controller: self.state.controller_address.ok_or_else(|| missing("controller"))?,
            schemes,
            stand_alone: self
                .state
                .stand_alone
                .iter()
                .map(|s| NamedAddress {
                    name: s.name.clone(),
                    alias: s.alias.clone(),
                    address: s.address,
                })
                .collect(),
            voting_params: self.state.voting_params_hashes.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers used by the stages
    // -----------------------------------------------------------------------

    /// Save the state; the durability boundary after every step.
    pub(crate) fn persist(&mut self) -> Result<(), MigrateError> {
        self.state.account_nonce = Some(self.nonce);
        self.state.touch();
        store::save_at(&self.home, &self.state)?;
        Ok(())
    }

    pub(crate) fn save_record(&self) -> Result<(), MigrateError> {
        save_record(&self.record_path, &self.record)?;
        Ok(())
    }

    pub(crate) fn artifact(&self, name: &str) -> Result<&'a Artifact, MigrateError> {
        let registry: &'a ArtifactRegistry = self.artifacts;
        Ok(registry.get(&ContractName::from(name))?)
    }

    pub(crate) fn base_address(&self, name: &str) -> Result<Address, MigrateError> {
        self.state
            .base_addresses
            .get(&ContractName::from(name))
            .copied()
            .ok_or_else(|| MigrateError::Precondition(format!("base contract {name} has no recorded address")))
    }

    pub(crate) fn avatar(&self) -> Result<Address, MigrateError> {
        self.state
            .application_address
            .ok_or_else(|| MigrateError::Precondition("the organization has not been created".into()))
    }

    pub(crate) fn controller_artifact_name(&self) -> &'static str {
        if self.params.use_universal_controller {
            names::UCONTROLLER
        } else {
            names::CONTROLLER
        }
    }

    /// Record the fate of a failed submission. A reverted transaction still
    /// consumed a nonce, so the baseline moves and is saved without any
    /// progress marker; this is the one write on a failure path.
    fn note_failure(&mut self, step: &str, err: &crate::error::GatewayError) {
        warn!(step, error = %err, "submission failed; state left unchanged");
        if err.consumed_nonce() {
            self.nonce += 1;
            if let Err(save) = self.persist() {
                warn!(error = %save, "could not save nonce baseline after failure");
            }
        }
    }

    pub(crate) fn deploy(&mut self, step: &str, artifact: &Artifact, args: &[Token]) -> Result<Address, MigrateError> {
        info!(step, contract = %artifact.name(), "deploying");
        match self.gateway.deploy_contract(artifact, args) {
            Ok(d) => {
                self.nonce += 1;
                info!(step, address = %d.address, tx = %d.receipt.tx_hash, "deployed");
                Ok(d.address)
            }
            Err(e) => {
                self.note_failure(step, &e);
                Err(MigrateError::ledger(step, e))
            }
        }
    }

    pub(crate) fn send(
        &mut self,
        step: &str,
        to: Address,
        artifact: &Artifact,
        method: &str,
        args: &[Token],
    ) -> Result<Receipt, MigrateError> {
        info!(step, contract = %artifact.name(), method, "sending");
        match self.gateway.send_transaction(to, artifact, method, args) {
            Ok(r) => {
                self.nonce += 1;
                info!(step, tx = %r.tx_hash, block = r.block_number, "confirmed");
                Ok(r)
            }
            Err(e) => {
                self.note_failure(step, &e);
                Err(MigrateError::ledger(step, e))
            }
        }
    }

    /// Send with JSON arguments coerced to the method's input types.
    pub(crate) fn send_values(
        &mut self,
        step: &str,
        to: Address,
        artifact: &Artifact,
        method: &str,
        values: &[Value],
    ) -> Result<Receipt, MigrateError> {
        let function = artifact.function(method, values.len())?;
        let args = abi::coerce_params(method, &function.inputs, values)?;
        self.send(step, to, artifact, method, &args)
    }

    pub(crate) fn send_raw(&mut self, step: &str, to: Address, data: &[u8]) -> Result<Receipt, MigrateError> {
        info!(step, to = %to, "sending calldata");
        match self.gateway.send_raw(Some(to), data) {
            Ok(r) => {
                self.nonce += 1;
                info!(step, tx = %r.tx_hash, "confirmed");
                Ok(r)
            }
            Err(e) => {
                self.note_failure(step, &e);
                Err(MigrateError::ledger(step, e))
            }
        }
    }

    /// Read-only call with prepared calldata.
    pub(crate) fn call_raw(&mut self, step: &str, to: Address, data: &[u8]) -> Result<Bytes, MigrateError> {
        self.gateway
            .call_raw(to, data)
            .map_err(|e| MigrateError::ledger(step, e))
    }

    pub(crate) fn call(
        &mut self,
        step: &str,
        to: Address,
        artifact: &Artifact,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, MigrateError> {
        self.gateway
            .call_contract(to, artifact, method, args)
            .map_err(|e| MigrateError::ledger(step, e))
    }

    /// Read a single address returned by a view method.
    pub(crate) fn read_address(
        &mut self,
        step: &str,
        to: Address,
        artifact: &Artifact,
        method: &str,
    ) -> Result<Address, MigrateError> {
        self.call(step, to, artifact, method, &[])?
            .first()
            .and_then(token_address)
            .ok_or_else(|| AbiError::Decode(format!("{method}() did not return an address")).into())
    }

    /// Run `f` with a resolver over the addresses known right now.
    pub(crate) fn with_resolver<T>(&self, f: impl FnOnce(&ResolveContext<'_>) -> T) -> T {
        let stand_alone: Vec<Address> = self.state.stand_alone.iter().map(|s| s.address).collect();
        let modules: Vec<Option<Address>> = self.state.module_registrations.iter().map(|m| m.address).collect();
        let resolver = ResolveContext {
            voting_machine: self
                .state
                .base_addresses
                .get(&ContractName::from(names::GENESIS_PROTOCOL))
                .copied(),
            avatar: self.state.application_address,
            controller: self.state.controller_address,
            native_token: self.state.token_address,
            native_reputation: self.state.reputation_address,
            voting_params: &self.state.voting_params_hashes,
            stand_alone: &stand_alone,
            package: &self.state.base_addresses,
            modules: &modules,
        };
        f(&resolver)
    }

    /// Address and artifact name of a hook target.
    pub(crate) fn hook_target(&self, field: &str, target: &ContractRef) -> Result<(Address, ContractName), MigrateError> {
        let unavailable = |what: String| -> MigrateError {
            ConfigError::invalid(field, format!("{what} is not available")).into()
        };
        match target {
            ContractRef::StandAlone(j) => self
                .state
                .stand_alone
                .get(*j)
                .map(|s| (s.address, s.name.clone()))
                .ok_or_else(|| unavailable(format!("stand-alone contract {j}"))),
            ContractRef::Module(k) => self
                .state
                .module_registrations
                .get(*k)
                .and_then(|m| m.address.map(|a| (a, m.name.clone())))
                .ok_or_else(|| unavailable(format!("module {k}"))),
            ContractRef::PackageContract(name) => self
                .state
                .base_addresses
                .get(name)
                .map(|a| (*a, artifact_for(name)))
                .ok_or_else(|| unavailable(format!("package contract {name}"))),
            ContractRef::WellKnown(w) => {
                let artifact = well_known_artifact(*w, self.params.use_universal_controller)
                    .ok_or_else(|| ConfigError::invalid(field, "cannot call the zero address"))?;
                self.with_resolver(|r| r.well_known(*w))
                    .map(|a| (a, ContractName::from(artifact)))
                    .ok_or_else(|| unavailable(format!("{w:?}")))
            }
        }
    }
}
