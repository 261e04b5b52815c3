//! The workflow stages, in execution order.
//!
//! Every stage first checks the state and skips work that is already
//! recorded, so a resumed run re-enters each stage at its first missing step.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info};

use daomig_core::constants::{DEFAULT_SCHEMES_METADATA, ZERO_HASH};
use daomig_core::{Address, Bytes, ConfigError, ContractName, DeploymentMode, VotingParamsSpec};
use daomig_ledger::{BaseEntry, Counter, FoundersProgress, ModuleRegistration, Stage, StandAloneRecord};
use ethers::types::U256;

use crate::abi::{self, address_token, bytes32_token, token_address, token_bytes32, token_uint, ParamType, Token};
use crate::artifacts::Artifact;
use crate::base::{base_plan, names, BaseArg};
use crate::error::{AbiError, MigrateError};
use crate::founders::{founder_arrays, initial_batch, remaining_batches};
use crate::gateway::{LedgerGateway, Receipt};
use crate::orchestrator::MigrationContext;
use crate::resolver::ReuseResolver;

fn skip_if_complete<G: LedgerGateway>(ctx: &MigrationContext<'_, G>, stage: Stage) -> bool {
    let done = ctx.state.is_stage_complete(stage);
    if done {
        debug!(stage = %stage, "already complete");
    }
    done
}

fn complete<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>, stage: Stage) -> Result<(), MigrateError> {
    ctx.state.complete_stage(stage);
    ctx.persist()?;
    info!(stage = %stage, "stage complete");
    Ok(())
}

/// Decode every `event` in `receipt`.
fn events(
    step: &str,
    receipt: &Receipt,
    artifact: &Artifact,
    event: &str,
) -> Result<Vec<BTreeMap<String, Token>>, MigrateError> {
    let event = artifact.event(event)?;
    receipt.events(event).map_err(|e| {
        MigrateError::Abi(AbiError::Decode(format!("{step}: {e}")))
    })
}

fn event_address(step: &str, fields: &BTreeMap<String, Token>, field: &str) -> Result<Address, MigrateError> {
    fields
        .get(field)
        .and_then(token_address)
        .ok_or_else(|| AbiError::Decode(format!("{step}: event has no address field {field}")).into())
}

fn wei(field: &str, amount: &daomig_core::Amount) -> Result<U256, ConfigError> {
    amount
        .to_wei()
        .map_err(|e| ConfigError::invalid(field, e.to_string()))
}

// ---------------------------------------------------------------------------
// Base package
// ---------------------------------------------------------------------------

/// Make every base contract available: pinned, reused or freshly deployed.
pub(crate) fn package_ready<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::PackageReady) {
        return Ok(());
    }
    let network = ctx.network;
    let mut entries = Vec::new();

    for contract in base_plan() {
        let pinned = network.pinned_contracts.get(&contract.name).copied();
        let dependencies: Vec<Address> = if pinned.is_some() {
            Vec::new()
        } else {
            contract
                .dependencies()
                .map(|d| ctx.base_address(d.as_str()))
                .collect::<Result<_, _>>()?
        };

        let address = match (ctx.state.base_addresses.get(&contract.name).copied(), pinned) {
            (Some(address), _) => {
                debug!(contract = %contract.name, %address, "already available");
                address
            }
            (None, Some(address)) => {
                info!(contract = %contract.name, %address, "using pinned address");
                ctx.state.set_base_address(contract.name.clone(), address)?;
                ctx.persist()?;
                address
            }
            (None, None) => {
                let artifact = ctx.artifact(contract.artifact.as_str())?;
                let step = format!("deploy {}", contract.name);
                let reused = ReuseResolver::new(
                    &ctx.record,
                    &ctx.network_key,
                    &network.package_version,
                    &ctx.options.reuse,
                )
                .should_reuse(&mut *ctx.gateway, &contract.name, &artifact.deployed_bytecode, &dependencies)
                .map_err(|e| MigrateError::ledger(format!("reuse check for {}", contract.name), e))?;

                let address = match reused {
                    Some(address) => address,
                    None if contract.private_only && !network.private => {
                        return Err(MigrateError::Precondition(format!(
                            "{} is only deployed on private networks; pin its address under \
                             networks.{}.pinned_contracts",
                            contract.name, ctx.network_key
                        )));
                    }
                    None => {
                        let values = contract
                            .args
                            .iter()
                            .map(|arg| match arg {
                                BaseArg::Dependency(dep) => Ok(json!(ctx.base_address(dep.as_str())?.to_string())),
                                BaseArg::Literal(v) => Ok(v.clone()),
                            })
                            .collect::<Result<Vec<Value>, MigrateError>>()?;
                        let args = artifact.constructor_args(&values)?;
                        ctx.deploy(&step, artifact, &args)?
                    }
                };
                ctx.state.set_base_address(contract.name.clone(), address)?;
                ctx.persist()?;
                address
            }
        };
        entries.push((contract.name, BaseEntry::new(address, dependencies)));
    }

    let version = network.package_version.clone();
    ctx.record.record_base(&ctx.network_key, &version, entries);
    ctx.save_record()?;
    complete(ctx, Stage::PackageReady)
}

// ---------------------------------------------------------------------------
// Organization instance
// ---------------------------------------------------------------------------

/// Create the avatar, token, reputation and controller.
pub(crate) fn instance_created<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::InstanceCreated) {
        return Ok(());
    }
    let mode = ctx.params.mode;
    match mode {
        DeploymentMode::Factory => forge_instance(ctx)?,
        DeploymentMode::Controller => build_instance(ctx)?,
    }
    complete(ctx, Stage::InstanceCreated)
}

/// Factory mode: one `forgeOrg` call carrying the initial founder batch.
fn forge_instance<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    let params = ctx.params;
    if ctx.state.application_address.is_none() {
        let creator_address = ctx.base_address(names::DAO_CREATOR)?;
        let creator = ctx.artifact(names::DAO_CREATOR)?;
        let total = params.founders.len();
        let initial = initial_batch(total, ctx.network.batches.initial_founders);
        let [addresses, tokens, reputation] = founder_arrays(&params.founders[initial.clone()])?;
        let universal = if params.use_universal_controller {
            ctx.base_address(names::UCONTROLLER)?
        } else {
            Address::ZERO
        };
        let args = [
            Token::String(params.org_name.clone()),
            Token::String(params.token_name()),
            Token::String(params.token_symbol()),
            addresses,
            tokens,
            reputation,
            address_token(universal),
            Token::Uint(wei("token_cap", &params.token_cap)?),
        ];
        let step = "create organization";
        let receipt = ctx.send(step, creator_address, creator, "forgeOrg", &args)?;
        let created = events(step, &receipt, creator, "NewOrg")?;
        let first = created.first().ok_or_else(|| MigrateError::MissingEvent {
            step: step.into(),
            event: "NewOrg".into(),
            expected: 1,
            found: 0,
        })?;
        let avatar = event_address(step, first, "_avatar")?;
        ctx.state.set_application_address(avatar)?;
        let mut progress = FoundersProgress::new(total);
        if !initial.is_empty() {
            progress.record_batch(initial.len());
        }
        ctx.state.founders = Some(progress);
        ctx.persist()?;
        info!(%avatar, founders = initial.len(), "organization created");
    }

    let state = &ctx.state;
    if state.token_address.is_none() || state.reputation_address.is_none() || state.controller_address.is_none() {
        let avatar = ctx.avatar()?;
        let avatar_artifact = ctx.artifact(names::AVATAR)?;
        let token = ctx.read_address("read native token", avatar, avatar_artifact, "nativeToken")?;
        let reputation = ctx.read_address("read native reputation", avatar, avatar_artifact, "nativeReputation")?;
        let controller = ctx.read_address("read avatar owner", avatar, avatar_artifact, "owner")?;
        ctx.state.set_token_address(token)?;
        ctx.state.set_reputation_address(reputation)?;
        ctx.state.set_controller_address(controller)?;
        ctx.persist()?;
        debug!(%token, %reputation, %controller, "instance addresses recorded");
    }
    Ok(())
}

/// Controller mode: each contract and every founder mint is its own step.
fn build_instance<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    let params = ctx.params;
    let universal = params.use_universal_controller;

    let token = match ctx.state.token_address {
        Some(a) => a,
        None => {
            let artifact = ctx.artifact(names::DAO_TOKEN)?;
            let cap = wei("token_cap", &params.token_cap)?;
            let args = artifact.constructor_args(&[
                json!(params.token_name()),
                json!(params.token_symbol()),
                json!(cap.to_string()),
            ])?;
            let address = ctx.deploy("deploy native token", artifact, &args)?;
            ctx.state.set_token_address(address)?;
            ctx.persist()?;
            address
        }
    };
    let reputation = match ctx.state.reputation_address {
        Some(a) => a,
        None => {
            let artifact = ctx.artifact(names::REPUTATION)?;
            let address = ctx.deploy("deploy native reputation", artifact, &[])?;
            ctx.state.set_reputation_address(address)?;
            ctx.persist()?;
            address
        }
    };
    let avatar = match ctx.state.application_address {
        Some(a) => a,
        None => {
            let artifact = ctx.artifact(names::AVATAR)?;
            let args = [
                Token::String(params.org_name.clone()),
                address_token(token),
                address_token(reputation),
            ];
            let address = ctx.deploy("deploy avatar", artifact, &args)?;
            ctx.state.set_application_address(address)?;
            ctx.persist()?;
            address
        }
    };

    let mut mints = Vec::new();
    for (i, f) in params.founders.iter().enumerate() {
        let rep = wei(&format!("founders[{i}].reputation"), &f.reputation)?;
        if !rep.is_zero() {
            mints.push((reputation, names::REPUTATION, f.address, rep));
        }
        let tokens = wei(&format!("founders[{i}].tokens"), &f.tokens)?;
        if !tokens.is_zero() {
            mints.push((token, names::DAO_TOKEN, f.address, tokens));
        }
    }
    for (i, (contract, artifact_name, to, amount)) in mints.into_iter().enumerate() {
        if ctx.state.manual_instance.mints.is_done(i) {
            continue;
        }
        let artifact = ctx.artifact(artifact_name)?;
        ctx.send(
            &format!("mint {artifact_name} for {to}"),
            contract,
            artifact,
            "mint",
            &[address_token(to), Token::Uint(amount)],
        )?;
        ctx.state.manual_instance.mints.advance();
        ctx.persist()?;
    }
    if ctx.state.founders.is_none() {
        let total = params.founders.len();
        ctx.state.founders = Some(FoundersProgress {
            total,
            added: total,
            batches_completed: 0,
        });
        ctx.persist()?;
    }

    let controller = match ctx.state.controller_address {
        Some(a) => a,
        None => {
            let address = if universal {
                ctx.base_address(names::UCONTROLLER)?
            } else {
                let artifact = ctx.artifact(names::CONTROLLER)?;
                ctx.deploy("deploy controller", artifact, &[address_token(avatar)])?
            };
            ctx.state.set_controller_address(address)?;
            ctx.persist()?;
            address
        }
    };

    let owned = [
        (avatar, names::AVATAR),
        (reputation, names::REPUTATION),
        (token, names::DAO_TOKEN),
    ];
    for (i, (contract, artifact_name)) in owned.into_iter().enumerate() {
        if ctx.state.manual_instance.ownership_transfers.is_done(i) {
            continue;
        }
        let artifact = ctx.artifact(artifact_name)?;
        ctx.send(
            &format!("transfer {artifact_name} ownership"),
            contract,
            artifact,
            "transferOwnership",
            &[address_token(controller)],
        )?;
        ctx.state.manual_instance.ownership_transfers.advance();
        ctx.persist()?;
    }

    if universal && !ctx.state.manual_instance.universal_controller_registered {
        let artifact = ctx.artifact(names::UCONTROLLER)?;
        ctx.send(
            "register organization with universal controller",
            controller,
            artifact,
            "newOrganization",
            &[address_token(avatar)],
        )?;
        ctx.state.manual_instance.universal_controller_registered = true;
        ctx.persist()?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Founders and registry
// ---------------------------------------------------------------------------

/// Register the founders the creation call did not carry, batch by batch.
pub(crate) fn founders_added<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::FoundersAdded) {
        return Ok(());
    }
    if ctx.params.mode == DeploymentMode::Factory {
        let params = ctx.params;
        let founders = &params.founders;
        let mut progress = ctx.state.founders.ok_or_else(|| {
            MigrateError::Precondition("founder progress missing after instance creation".into())
        })?;
        let avatar = ctx.avatar()?;
        let creator_address = ctx.base_address(names::DAO_CREATOR)?;
        let creator = ctx.artifact(names::DAO_CREATOR)?;

        for batch in remaining_batches(founders.len(), progress.added, ctx.network.batches.founders) {
            let [addresses, tokens, reputation] = founder_arrays(&founders[batch.clone()])?;
            ctx.send(
                &format!("add founders {}..{}", batch.start, batch.end),
                creator_address,
                creator,
                "addFounders",
                &[address_token(avatar), addresses, tokens, reputation],
            )?;
            progress.record_batch(batch.len());
            ctx.state.founders = Some(progress);
            ctx.persist()?;
        }
    }
    complete(ctx, Stage::FoundersAdded)
}

/// Optional two-step listing in the organization registry.
pub(crate) fn dao_registry_registered<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::DaoRegistryRegistered) {
        return Ok(());
    }
    if ctx.params.register_in_dao_registry {
        let avatar = ctx.avatar()?;
        let registry = ctx.base_address(names::DAO_REGISTRY)?;
        let artifact = ctx.artifact(names::DAO_REGISTRY)?;
        let calls = [
            ("propose", vec![address_token(avatar)]),
            (
                "register",
                vec![address_token(avatar), Token::String(ctx.params.org_name.clone())],
            ),
        ];
        for (i, (method, args)) in calls.iter().enumerate() {
            if ctx.state.registry_steps.is_done(i) {
                continue;
            }
            ctx.send(&format!("registry {method}"), registry, artifact, method, args)?;
            ctx.state.registry_steps.advance();
            ctx.persist()?;
        }
    }
    complete(ctx, Stage::DaoRegistryRegistered)
}

// ---------------------------------------------------------------------------
// Voting parameters
// ---------------------------------------------------------------------------

/// Register each voting parameter set and record its hash in order.
pub(crate) fn voting_params_set<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::VotingParamsSet) {
        return Ok(());
    }
    let params = ctx.params;
    let done = ctx.state.voting_params_hashes.len();
    for (i, spec) in params.voting_machines_params.iter().enumerate().skip(done) {
        let hash = match spec {
            VotingParamsSpec::Precomputed { voting_params_hash } => {
                info!(index = i, hash = %voting_params_hash, "using precomputed voting params");
                *voting_params_hash
            }
            VotingParamsSpec::Parameters(p) => {
                let step = format!("set voting params {i}");
                let machine = ctx.base_address(names::GENESIS_PROTOCOL)?;
                let artifact = ctx.artifact(names::GENESIS_PROTOCOL)?;
                let values = p.to_uint_array().map_err(|e| match e {
                    ConfigError::Invalid { field, message } => {
                        ConfigError::invalid(format!("voting_machines_params[{i}].{field}"), message)
                    }
                    other => other,
                })?;
                let args = [
                    Token::FixedArray(values.iter().map(|v| Token::Uint(*v)).collect()),
                    address_token(p.vote_on_behalf),
                ];
                let hash = ctx
                    .call(&step, machine, artifact, "setParameters", &args)?
                    .first()
                    .and_then(token_bytes32)
                    .ok_or_else(|| AbiError::Decode(format!("{step}: setParameters returned no hash")))?;
                let existing = ctx.call(
                    &format!("read voting params {i}"),
                    machine,
                    artifact,
                    "parameters",
                    &[bytes32_token(hash)],
                )?;
                let registered = existing.first().and_then(token_uint).is_some_and(|v| !v.is_zero());
                if registered {
                    info!(index = i, %hash, "voting params already registered on chain");
                } else {
                    ctx.send(&step, machine, artifact, "setParameters", &args)?;
                }
                hash
            }
        };
        ctx.state.push_voting_params_hash(hash);
        ctx.persist()?;
    }
    complete(ctx, Stage::VotingParamsSet)
}

// ---------------------------------------------------------------------------
// Stand-alone contracts
// ---------------------------------------------------------------------------

/// Deploy, initialize and hook up each stand-alone contract in order.
pub(crate) fn stand_alone_deployed<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::StandAloneDeployed) {
        return Ok(());
    }
    let params = ctx.params;
    for (i, spec) in params.stand_alone.iter().enumerate() {
        let artifact = ctx.artifact(spec.name.as_str())?;
        if i >= ctx.state.stand_alone.len() {
            let field = format!("stand_alone[{i}].constructor_params");
            let values = ctx.with_resolver(|r| r.resolve(&field, &spec.constructor_params, None))?;
            let args = artifact.constructor_args(&values)?;
            let address = ctx.deploy(&format!("deploy stand-alone {}", spec.name), artifact, &args)?;
            ctx.state.push_stand_alone(StandAloneRecord {
                name: spec.name.clone(),
                alias: spec.alias.clone(),
                address,
                initialized: false,
                hooks: Counter::default(),
            });
            ctx.persist()?;
        }
        let address = ctx.state.stand_alone[i].address;

        if let Some(init) = &spec.initialize {
            if !ctx.state.stand_alone[i].initialized {
                let field = format!("stand_alone[{i}].initialize.params");
                let values = ctx.with_resolver(|r| r.resolve(&field, &init.params, None))?;
                ctx.send_values(&format!("initialize {}", spec.name), address, artifact, &init.method, &values)?;
                ctx.state.stand_alone[i].initialized = true;
                ctx.persist()?;
            }
        }

        for (h, hook) in spec.hooks.iter().enumerate() {
            if ctx.state.stand_alone[i].hooks.is_done(h) {
                continue;
            }
            let field = format!("stand_alone[{i}].hooks[{h}].params");
            let values = ctx.with_resolver(|r| r.resolve(&field, &hook.params, None))?;
            ctx.send_values(&format!("{}.{}", spec.name, hook.method), address, artifact, &hook.method, &values)?;
            ctx.state.stand_alone[i].hooks.advance();
            ctx.persist()?;
        }
    }
    complete(ctx, Stage::StandAloneDeployed)
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Resolve each module's parameters and encode its initializer call.
pub(crate) fn modules_described<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::ModulesDescribed) {
        return Ok(());
    }
    let params = ctx.params;
    let done = ctx.state.module_registrations.len();
    for (i, module) in params.modules.iter().enumerate().skip(done) {
        let artifact = ctx.artifact(module.name.as_str())?;
        let field = format!("modules[{i}].params");
        let values = ctx.with_resolver(|r| r.resolve(&field, &module.params, Some(module)))?;
        let function = artifact.function(module.initializer(), values.len())?;
        let args = abi::coerce_params(&function.name, &function.inputs, &values)?;
        let calldata = abi::encode_call(function, &args)?;
        debug!(module = module.display_name(), bytes = calldata.len(), "module described");
        ctx.state.push_module(ModuleRegistration {
            name: module.name.clone(),
            alias: module.alias.clone(),
            encoded_params: Bytes::from(calldata),
            permissions: module.permissions,
            address: module.address,
            params_hash: None,
            initialized: false,
            registered: false,
        });
        ctx.persist()?;
    }
    complete(ctx, Stage::ModulesDescribed)
}

/// A module name as the factory's `bytes32` identifier.
fn name_word(index: usize, name: &ContractName) -> Result<Token, ConfigError> {
    let bytes = name.as_str().as_bytes();
    if bytes.len() > 32 {
        return Err(ConfigError::invalid(
            format!("modules[{index}].name"),
            "longer than 32 bytes",
        ));
    }
    let mut word = vec![0u8; 32];
    word[..bytes.len()].copy_from_slice(bytes);
    Ok(Token::FixedBytes(word))
}

/// Install every described module with its permissions.
pub(crate) fn modules_registered<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::ModulesRegistered) {
        return Ok(());
    }
    if !ctx.state.modules_finalized {
        let mode = ctx.params.mode;
        match mode {
            DeploymentMode::Factory => set_schemes(ctx)?,
            DeploymentMode::Controller => register_schemes(ctx)?,
        }
    }
    complete(ctx, Stage::ModulesRegistered)
}

/// Factory mode: one `setSchemes` call installs everything and hands the
/// avatar over to its controller.
fn set_schemes<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    let avatar = ctx.avatar()?;
    let creator_address = ctx.base_address(names::DAO_CREATOR)?;
    let creator = ctx.artifact(names::DAO_CREATOR)?;

    let regs = &ctx.state.module_registrations;
    let names_arg = regs
        .iter()
        .enumerate()
        .map(|(i, r)| name_word(i, &r.name))
        .collect::<Result<Vec<_>, _>>()?;
    let data: Vec<u8> = regs.iter().flat_map(|r| r.encoded_params.iter().copied()).collect();
    let lengths = regs.iter().map(|r| Token::Uint(U256::from(r.encoded_params.len()))).collect();
    let permissions = regs
        .iter()
        .map(|r| Token::FixedBytes(r.permissions.to_be_bytes().to_vec()))
        .collect();
    let metadata = if ctx.params.metadata.is_empty() {
        DEFAULT_SCHEMES_METADATA.to_string()
    } else {
        ctx.params.metadata.clone()
    };
    let expected = regs.len();
    let args = [
        address_token(avatar),
        Token::Array(names_arg),
        Token::Bytes(data),
        Token::Array(lengths),
        Token::Array(permissions),
        Token::String(metadata),
    ];

    let step = "install modules";
    let receipt = ctx.send(step, creator_address, creator, "setSchemes", &args)?;
    let installed = events(step, &receipt, creator, "SchemeInstance")?;
    if installed.len() != expected {
        return Err(MigrateError::MissingEvent {
            step: step.into(),
            event: "SchemeInstance".into(),
            expected,
            found: installed.len(),
        });
    }
    for (reg, fields) in ctx.state.module_registrations.iter_mut().zip(&installed) {
        reg.address = Some(event_address(step, fields, "_scheme")?);
        reg.initialized = true;
        reg.registered = true;
    }
    ctx.state.modules_finalized = true;
    ctx.persist()?;
    info!(modules = expected, "modules installed");
    Ok(())
}

/// Controller mode: deploy (unless an address is given), initialize and
/// register each module in turn.
///
/// A universal module is configured through `setParameters`; the hash that
/// call returns is recorded before the transaction is sent and registered
/// with the module. Other modules register with the zero hash.
fn register_schemes<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    let avatar = ctx.avatar()?;
    let controller = ctx.state.controller_address.ok_or_else(|| {
        MigrateError::Precondition("controller is not recorded".into())
    })?;
    let controller_artifact = ctx.artifact(ctx.controller_artifact_name())?;

    for i in 0..ctx.state.module_registrations.len() {
        let reg = ctx.state.module_registrations[i].clone();
        let universal = ctx.params.modules.get(i).is_some_and(|m| m.universal);
        let address = match reg.address {
            Some(a) => a,
            None => {
                let artifact = ctx.artifact(reg.name.as_str())?;
                let address = ctx.deploy(&format!("deploy module {}", reg.name), artifact, &[])?;
                ctx.state.module_registrations[i].address = Some(address);
                ctx.persist()?;
                address
            }
        };
        if !reg.initialized {
            let step = format!("initialize module {}", reg.name);
            if universal && reg.params_hash.is_none() {
                let output = ctx.call_raw(&step, address, &reg.encoded_params)?;
                let hash = abi::decode(&[ParamType::FixedBytes(32)], &output)?
                    .first()
                    .and_then(token_bytes32)
                    .ok_or_else(|| AbiError::Decode(format!("{step}: setParameters returned no hash")))?;
                debug!(module = %reg.name, %hash, "module parameters hash");
                ctx.state.module_registrations[i].params_hash = Some(hash);
                ctx.persist()?;
            }
            ctx.send_raw(&step, address, &reg.encoded_params)?;
            ctx.state.module_registrations[i].initialized = true;
            ctx.persist()?;
        }
        if !reg.registered {
            let params_hash = ctx.state.module_registrations[i].params_hash.unwrap_or(ZERO_HASH);
            ctx.send(
                &format!("register module {}", reg.name),
                controller,
                controller_artifact,
                "registerScheme",
                &[
                    address_token(address),
                    bytes32_token(params_hash),
                    Token::FixedBytes(reg.permissions.to_be_bytes().to_vec()),
                    address_token(avatar),
                ],
            )?;
            ctx.state.module_registrations[i].registered = true;
            ctx.persist()?;
        }
    }
    ctx.state.modules_finalized = true;
    ctx.persist()
}

// ---------------------------------------------------------------------------
// Post-install hooks
// ---------------------------------------------------------------------------

/// Run the configured calls against installed contracts, once each.
pub(crate) fn post_registration_hooks<G: LedgerGateway>(ctx: &mut MigrationContext<'_, G>) -> Result<(), MigrateError> {
    if skip_if_complete(ctx, Stage::PostRegistrationHooks) {
        return Ok(());
    }
    let params = ctx.params;
    for (h, hook) in params.post_install_hooks.iter().enumerate() {
        if ctx.state.post_hooks.is_done(h) {
            continue;
        }
        let (target, artifact_name) = ctx.hook_target(&format!("post_install_hooks[{h}].target"), &hook.target)?;
        let artifact = ctx.artifact(artifact_name.as_str())?;
        let field = format!("post_install_hooks[{h}].params");
        let values = ctx.with_resolver(|r| r.resolve(&field, &hook.params, None))?;
        ctx.send_values(&format!("post-install {}.{}", artifact_name, hook.method), target, artifact, &hook.method, &values)?;
        ctx.state.post_hooks.advance();
        ctx.persist()?;
    }
    complete(ctx, Stage::PostRegistrationHooks)
}
